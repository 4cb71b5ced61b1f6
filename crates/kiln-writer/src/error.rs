//! Error types for the Line Writer.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WriteError>;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("file on disk no longer matches the presented fingerprint: {path}")]
    Stale { path: PathBuf },

    #[error("file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("line {line} is out of bounds for {path}: {reason}")]
    Bounds { path: PathBuf, line: usize, reason: String },

    #[error("invalid mutation for {path}: {reason}")]
    Validation { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
