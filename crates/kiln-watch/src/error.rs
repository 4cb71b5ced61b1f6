//! Error types for the recursive watcher and Reader Client.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("failed to install filesystem watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: kiln_parser::ParseError,
    },

    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),

    #[error(transparent)]
    Core(#[from] kiln_core::CoreError),

    #[error("watcher is shutting down")]
    ShuttingDown,
}
