//! Repository layer
//!
//! Repositories abstract every collaborator the orchestrator talks to: the
//! BI service (tokens, dataset inventory, refresh start and status), the CSV
//! inputs (owners, blocked datasets) and the report sink. They classify raw
//! responses into the tagged results the scheduler matches on, without any
//! scheduling logic of their own.
//!
//! All repositories are trait-based to enable testing and mocking.

mod blocked;
mod error;
mod owners;
mod remote;
mod report;

// Re-export traits
pub use blocked::BlockedSetSource;
pub use owners::OwnerSource;
pub use remote::{InventorySource, RemoteJobClient};
pub use report::ReportSink;

// Re-export implementations
pub use blocked::CsvBlockedSetSource;
pub use owners::CsvOwnerSource;
pub use remote::HttpRemoteJobClient;
pub use report::CsvReportSink;

// Re-export result and error types
pub use error::{PersistenceError, SourceError};
pub use remote::{RefreshStatus, RemoteError, StartOutcome};
