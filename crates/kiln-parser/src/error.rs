//! Parse error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("malformed front matter: {0}")]
    FrontMatter(String),

    #[error("malformed task line: {0}")]
    Task(String),
}
