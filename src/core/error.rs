//! Unified error handling for pingport
//!
//! Errors raised while building listeners or loading handlers. Lifecycle
//! actions never surface these to their caller; the coordinator records
//! them as outcomes instead.

use std::fmt;

/// Error type for exporter, container and handler setup
#[derive(Debug)]
pub enum ExportError {
    /// Configuration-related errors
    Configuration(String),

    /// SSL/TLS listener setup errors
    Tls(String),

    /// Internal system errors
    Internal(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            ExportError::Tls(msg) => write!(f, "SSL/TLS error: {msg}"),
            ExportError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

/// Result type alias for exporter operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> ExportResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> ExportResult<T> {
        self.map_err(|e| ExportError::Internal(format!("{context}: {e}")))
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:literal $(,)?) => {
        $crate::core::ExportError::Configuration(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::ExportError::Configuration(format!($fmt, $($arg)*))
    };
    ($msg:expr) => {
        $crate::core::ExportError::Configuration($msg.to_string())
    };
}
