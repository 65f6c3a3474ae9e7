//! Core abstractions shared by the exporter and the lifecycle coordinator
//!
//! This module provides the container, error types, readiness flag and
//! metrics the rest of pingport builds on.

pub mod container;
pub mod error;
pub mod metrics;
pub mod status;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use container::ServiceContainer;
pub use error::{ErrorContext, ExportError, ExportResult};
