//! Line mutations (§4.D) applied to a document's body by `update-content`.

/// Sentinel meaning "insert at body start (after front matter, if any)".
pub const AT_BEGIN: usize = 0;
/// Sentinel meaning "insert at body end".
pub const AT_END: usize = usize::MAX;

/// One ordered step of an `update-content` batch. Line numbers are raw
/// 1-based file line numbers; sentinels are only legal on `Add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMutation {
    Add { line: usize, text: String },
    Remove { line: usize },
    Update { line: usize, text: String },
}

impl LineMutation {
    pub fn add_at_begin(text: impl Into<String>) -> Self {
        LineMutation::Add { line: AT_BEGIN, text: text.into() }
    }

    pub fn add_at_end(text: impl Into<String>) -> Self {
        LineMutation::Add { line: AT_END, text: text.into() }
    }
}
