//! Fingerprint-guarded line writer for the kiln note engine.

pub mod error;
pub mod mutation;
pub mod writer;

pub use error::{Result, WriteError};
pub use mutation::{LineMutation, AT_BEGIN, AT_END};
pub use writer::LineWriter;
