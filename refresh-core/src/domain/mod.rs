//! Core domain types
//!
//! This module contains the structures shared by the HTTP client and the runner.
//! They describe what is refreshed (jobs and their owners), what is excluded
//! (the blocked set) and what happened (outcome records and the outcome log).

pub mod blocked;
pub mod job;
pub mod outcome;
pub mod owner;
