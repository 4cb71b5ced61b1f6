//! The parsed-file data model owned by the Reader Client.

use std::fmt;
use std::time::SystemTime;

use crate::metadata::Metadata;

/// A root-relative, forward-slash normalized path key.
///
/// Path keys are stable for a given file until it is renamed or deleted;
/// normalizing the separator up front means callers on any platform can
/// compare and hash these directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelPath(String);

impl RelPath {
    /// Normalizes `raw` (which may use platform-native separators) into a
    /// forward-slash path key.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file extension, lower-cased, without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RelPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RelPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single parsed file as held by the Reader Client's cache.
///
/// Created on first scan or file-create, replaced wholesale on every write,
/// and removed on file-remove. Owned solely by the Reader Client: other
/// components receive clones via events, never a shared handle into the
/// cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: RelPath,
    fingerprint: String,
    metadata: Metadata,
    /// The body following any front-matter block, verbatim.
    content: String,
    /// 1-based raw-file line number of `content`'s first line; 0 if the
    /// file has no front-matter block, in which case body and raw line
    /// numbers coincide.
    content_start: usize,
    last_seen: SystemTime,
}

impl Document {
    pub fn new(
        path: RelPath,
        fingerprint: impl Into<String>,
        metadata: Metadata,
        content: impl Into<String>,
        content_start: usize,
        last_seen: SystemTime,
    ) -> Self {
        Self {
            path,
            fingerprint: fingerprint.into(),
            metadata,
            content: content.into(),
            content_start,
            last_seen,
        }
    }

    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// 1-based raw-file line number of the body's first line; 0 if there
    /// was no front-matter block, in which case body-relative and raw line
    /// numbers are the same.
    pub fn content_start(&self) -> usize {
        self.content_start
    }

    pub fn last_seen(&self) -> SystemTime {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_path_normalizes_backslashes() {
        assert_eq!(RelPath::new(r"notes\today.md").as_str(), "notes/today.md");
    }

    #[test]
    fn rel_path_extension_is_lowercase_suffix() {
        assert_eq!(RelPath::new("notes/today.MD").extension(), Some("MD"));
        assert_eq!(RelPath::new("notes/today").extension(), None);
    }

    #[test]
    fn document_exposes_its_fields() {
        let doc = Document::new(
            RelPath::new("a.md"),
            "deadbeef",
            Metadata::new(),
            "body",
            0,
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(doc.path().as_str(), "a.md");
        assert_eq!(doc.fingerprint(), "deadbeef");
        assert_eq!(doc.content(), "body");
        assert_eq!(doc.content_start(), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn path_segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,8}".prop_filter("non-empty", |s| !s.is_empty())
    }

    proptest! {
        #[test]
        fn rel_path_is_stable_once_forward_slashed(segments in prop::collection::vec(path_segment(), 1..5)) {
            let joined = segments.join("/");
            let once = RelPath::new(&joined);
            let twice = RelPath::new(once.as_str());
            assert_eq!(once, twice);
        }

        #[test]
        fn rel_path_backslashes_and_forward_slashes_normalize_the_same(segments in prop::collection::vec(path_segment(), 1..5)) {
            let forward = RelPath::new(&segments.join("/"));
            let back = RelPath::new(&segments.join("\\"));
            assert_eq!(forward, back);
        }
    }
}
