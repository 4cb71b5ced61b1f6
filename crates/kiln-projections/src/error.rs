//! Error types for the domain projections.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Write(#[from] kiln_writer::WriteError),

    #[error(transparent)]
    Watch(#[from] kiln_watch::WatchError),

    #[error(transparent)]
    Parse(#[from] kiln_parser::ParseError),

    #[error("ensure() exceeded its wait budget of {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("no entity found at {0}")]
    NotFound(String),
}
