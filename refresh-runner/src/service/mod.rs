//! Service layer
//!
//! Services contain business logic for the runner that sits in front of the
//! scheduler. They orchestrate repositories but never talk HTTP or files
//! directly.
//!
//! All services are trait-based to enable testing and dependency injection.

mod discovery;

// Re-export traits
pub use discovery::DiscoveryService;

// Re-export implementations
pub use discovery::StandardDiscoveryService;
