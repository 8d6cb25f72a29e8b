//! Scheduler layer for the runner
//!
//! This layer drives refresh jobs to completion. The dispatcher runs one wave
//! of jobs under the concurrency ceiling with round-based polling; the retry
//! coordinator runs the primary wave and then successive retry rounds over
//! the failures, using the same dispatcher for every round.

pub mod dispatcher;
pub mod retry;

pub use dispatcher::{DispatchSettings, Dispatcher, Wave};
pub use retry::{RetryCoordinator, RetryPolicy};
