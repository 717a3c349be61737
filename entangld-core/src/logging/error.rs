//! Logging setup failures

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("Invalid filter directive '{directive}': {reason}")]
    BadDirective { directive: String, reason: String },
}
