/*
    errors.rs - Error types for store operations

    Covers:
    - path parsing
    - local resolution (missing leaves, failing getters)
    - forwarding (transport, remote failures, pending-request limits)
    - inbound message validation
*/

use thiserror::Error;

use crate::core_path::{GetterError, PathError};
use crate::core_router::TransportError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Path could not be parsed or named the root where a leaf is required
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Nothing stored at the path and no attachment covers it
    #[error("Not found: {0}")]
    NotFound(String),

    /// A getter leaf failed
    #[error("Getter failed at '{path}': {message}")]
    Getter { path: String, message: String },

    /// A peer answered a forwarded get with an error
    #[error("Remote get failed at '{path}': {message}")]
    Remote { path: String, message: String },

    #[error("No transport installed")]
    NoTransport,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Leaves can only be defined locally; the path is attached to a peer
    #[error("Cannot define '{0}': path is attached to a peer")]
    Unforwardable(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Too many pending requests (limit {0})")]
    TooManyPending(usize),

    /// The pending entry was discarded before the answer arrived
    #[error("Request dropped: {0}")]
    RequestDropped(String),

    /// get_sync on a current-thread runtime would deadlock
    #[error("get_sync called from inside a current-thread runtime")]
    BlockingInRuntime,

    /// get_sync could not start a runtime to drive the request
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Lock poisoned: a thread panicked while holding the lock")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<PathError> for StoreError {
    fn from(err: PathError) -> Self {
        StoreError::InvalidPath(err.to_string())
    }
}

impl StoreError {
    pub(crate) fn getter(path: impl ToString, err: GetterError) -> Self {
        StoreError::Getter {
            path: path.to_string(),
            message: err.0,
        }
    }
}
