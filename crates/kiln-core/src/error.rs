//! Error types shared by the core document model, hashing and event-bus
//! primitives.

use thiserror::Error;

/// Result type alias for `kiln-core` operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("subscriber channel closed")]
    SubscriberClosed,

    #[error("event bus is shutting down")]
    ShuttingDown,
}
