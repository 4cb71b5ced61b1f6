//! The Line Writer (§4.D): create / update-metadata / update-content /
//! rename / delete, all guarded by content fingerprints, all written via
//! write-to-temp-then-rename so a crash mid-write never leaves a
//! half-written file visible under the original name.

use std::path::{Path, PathBuf};

use kiln_core::{ContentHasher, Metadata, RelPath, Sha256Hasher};

use crate::error::{Result, WriteError};
use crate::mutation::{LineMutation, AT_BEGIN, AT_END};

/// Operates on files rooted at a single note root, identifying each by its
/// root-relative path.
pub struct LineWriter {
    root: PathBuf,
    hasher: Box<dyn ContentHasher>,
}

impl LineWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), hasher: Box::new(Sha256Hasher) }
    }

    fn abs(&self, path: &RelPath) -> PathBuf {
        self.root.join(path.as_str())
    }

    /// Creates a new file. Fails with [`WriteError::AlreadyExists`] if one
    /// is already there. Front matter is omitted entirely when `metadata`
    /// is empty.
    pub async fn create(&self, path: &RelPath, metadata: &Metadata, content: &str) -> Result<String> {
        let abs = self.abs(path);
        if tokio::fs::try_exists(&abs).await.map_err(|source| WriteError::Io { path: abs.clone(), source })? {
            return Err(WriteError::AlreadyExists { path: abs });
        }

        let rendered = format!("{}{}", kiln_parser::render_frontmatter(metadata), content);
        self.write_atomic(&abs, rendered.as_bytes()).await?;
        Ok(self.hasher.fingerprint(rendered.as_bytes()))
    }

    /// Replaces the front-matter block, preserving the body verbatim.
    /// Requires `expected_fingerprint` to match the file's current
    /// contents.
    pub async fn update_metadata(&self, path: &RelPath, expected_fingerprint: &str, metadata: &Metadata) -> Result<String> {
        let abs = self.abs(path);
        let raw = self.read_checked(&abs, expected_fingerprint).await?;
        let parsed = kiln_parser::parse_document(&raw).map_err(|source| WriteError::Validation {
            path: abs.clone(),
            reason: source.to_string(),
        })?;

        let rendered = format!("{}{}", kiln_parser::render_frontmatter(metadata), parsed.content);
        self.write_atomic(&abs, rendered.as_bytes()).await?;
        Ok(self.hasher.fingerprint(rendered.as_bytes()))
    }

    /// Applies an ordered batch of line mutations to the body only (front
    /// matter, if any, is preserved verbatim). The whole batch is validated
    /// before anything is written; if any mutation fails, the file is left
    /// untouched.
    pub async fn update_content(
        &self,
        path: &RelPath,
        expected_fingerprint: Option<&str>,
        mutations: &[LineMutation],
    ) -> Result<String> {
        let abs = self.abs(path);

        let all_sentinel_adds = mutations
            .iter()
            .all(|m| matches!(m, LineMutation::Add { line, .. } if *line == AT_BEGIN || *line == AT_END));
        if expected_fingerprint.is_none() && !all_sentinel_adds {
            return Err(WriteError::Validation {
                path: abs,
                reason: "fingerprint is required unless every mutation is a sentinel add".to_string(),
            });
        }

        let raw = match expected_fingerprint {
            Some(expected) => self.read_checked(&abs, expected).await?,
            None => self.read_unchecked(&abs).await?,
        };

        let lines = split_lines(&raw);
        let closing = detect_frontmatter_closing(&lines);
        let mutated = apply_mutations(lines, closing, mutations, &abs)?;

        let mut rendered = mutated.join("\n");
        rendered.push('\n');
        self.write_atomic(&abs, rendered.as_bytes()).await?;
        Ok(self.hasher.fingerprint(rendered.as_bytes()))
    }

    /// Renames a file. No fingerprint check: content is unchanged by a
    /// rename. Fails if `new` already exists.
    pub async fn rename(&self, old: &RelPath, new: &RelPath) -> Result<()> {
        let abs_old = self.abs(old);
        let abs_new = self.abs(new);
        if tokio::fs::try_exists(&abs_new).await.map_err(|source| WriteError::Io { path: abs_new.clone(), source })? {
            return Err(WriteError::AlreadyExists { path: abs_new });
        }
        tokio::fs::rename(&abs_old, &abs_new)
            .await
            .map_err(|source| WriteError::Io { path: abs_old, source })
    }

    /// Deletes a file. A missing file is not an error.
    pub async fn delete(&self, path: &RelPath) -> Result<()> {
        let abs = self.abs(path);
        match tokio::fs::remove_file(&abs).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WriteError::Io { path: abs, source }),
        }
    }

    async fn read_checked(&self, abs: &Path, expected_fingerprint: &str) -> Result<String> {
        let bytes = tokio::fs::read(abs).await.map_err(|source| WriteError::Io { path: abs.to_path_buf(), source })?;
        if self.hasher.fingerprint(&bytes) != expected_fingerprint {
            return Err(WriteError::Stale { path: abs.to_path_buf() });
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_unchecked(&self, abs: &Path) -> Result<String> {
        let bytes = tokio::fs::read(abs).await.map_err(|source| WriteError::Io { path: abs.to_path_buf(), source })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_atomic(&self, abs: &Path, bytes: &[u8]) -> Result<()> {
        let dir = abs.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await.map_err(|source| WriteError::Io { path: dir.to_path_buf(), source })?;

        let tmp_name = format!(".{}.kiln-tmp", abs.file_name().and_then(|n| n.to_str()).unwrap_or("write"));
        let tmp_path = dir.join(tmp_name);
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| WriteError::Io { path: tmp_path.clone(), source })?;
        tokio::fs::rename(&tmp_path, abs).await.map_err(|source| WriteError::Io { path: abs.to_path_buf(), source })
    }
}

/// Splits file bytes on newline, dropping a single trailing empty element
/// so a file ending with a newline round-trips exactly.
fn split_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// One-pass front-matter detection local to the writer: the first
/// non-empty line beginning with `---` opens a block, the next line
/// beginning with `---` closes it. Returns the closing line's 1-based
/// number.
fn detect_frontmatter_closing(lines: &[String]) -> Option<usize> {
    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx >= lines.len() || !lines[idx].trim_start().starts_with("---") {
        return None;
    }
    for (offset, line) in lines[idx + 1..].iter().enumerate() {
        if line.trim_start().starts_with("---") {
            return Some(idx + 1 + offset + 1);
        }
    }
    None
}

fn apply_mutations(
    mut lines: Vec<String>,
    closing: Option<usize>,
    mutations: &[LineMutation],
    abs: &Path,
) -> Result<Vec<String>> {
    for mutation in mutations {
        match mutation {
            LineMutation::Add { line, text } => {
                validate_text(text, abs)?;
                let resolved = resolve_add_line(*line, &lines, closing, abs)?;
                lines.insert(resolved - 1, text.clone());
            }
            LineMutation::Remove { line } => {
                let resolved = resolve_existing_line(*line, &lines, closing, abs)?;
                lines.remove(resolved - 1);
            }
            LineMutation::Update { line, text } => {
                validate_text(text, abs)?;
                let resolved = resolve_existing_line(*line, &lines, closing, abs)?;
                lines[resolved - 1] = text.clone();
            }
        }
    }
    Ok(lines)
}

fn validate_text(text: &str, abs: &Path) -> Result<()> {
    if text.contains('\n') {
        return Err(WriteError::Validation { path: abs.to_path_buf(), reason: "line text must not contain a newline".to_string() });
    }
    Ok(())
}

fn resolve_add_line(line: usize, lines: &[String], closing: Option<usize>, abs: &Path) -> Result<usize> {
    if line == AT_BEGIN {
        return Ok(closing.map(|c| c + 1).unwrap_or(1));
    }
    if line == AT_END {
        return Ok(lines.len() + 1);
    }
    if let Some(closing) = closing {
        if line <= closing {
            return Err(WriteError::Bounds {
                path: abs.to_path_buf(),
                line,
                reason: "line is within or below the front-matter block".to_string(),
            });
        }
    }
    if line > lines.len() + 1 {
        return Err(WriteError::Bounds { path: abs.to_path_buf(), line, reason: "line is past end of file".to_string() });
    }
    Ok(line)
}

fn resolve_existing_line(line: usize, lines: &[String], closing: Option<usize>, abs: &Path) -> Result<usize> {
    if line == AT_BEGIN || line == AT_END {
        return Err(WriteError::Validation {
            path: abs.to_path_buf(),
            reason: "sentinels are not permitted for remove/update".to_string(),
        });
    }
    if let Some(closing) = closing {
        if line <= closing {
            return Err(WriteError::Bounds {
                path: abs.to_path_buf(),
                line,
                reason: "line is within or below the front-matter block".to_string(),
            });
        }
    }
    if line == 0 || line > lines.len() {
        return Err(WriteError::Bounds { path: abs.to_path_buf(), line, reason: "line is out of range".to_string() });
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::MetadataValue;
    use pretty_assertions::assert_eq;

    async fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, contents).await.unwrap();
    }

    #[tokio::test]
    async fn create_writes_front_matter_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LineWriter::new(dir.path());
        let mut metadata = Metadata::new();
        metadata.insert("type", MetadataValue::Scalar("project".to_string()));

        let rel = RelPath::new("p.md");
        writer.create(&rel, &metadata, "# p\n").await.unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("p.md")).await.unwrap();
        assert_eq!(on_disk, "---\ntype: project\n---\n# p\n");
    }

    #[tokio::test]
    async fn create_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "x").await;
        let writer = LineWriter::new(dir.path());
        let err = writer.create(&RelPath::new("p.md"), &Metadata::new(), "x").await.unwrap_err();
        assert!(matches!(err, WriteError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_metadata_preserves_body() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "---\ntype: project\nstatus: active\n---\n# p\n\n").await;
        let writer = LineWriter::new(dir.path());
        let rel = RelPath::new("p.md");

        let current = tokio::fs::read(dir.path().join("p.md")).await.unwrap();
        let fingerprint = Sha256Hasher.fingerprint(&current);

        let mut metadata = Metadata::new();
        metadata.insert("type", MetadataValue::Scalar("project".to_string()));
        metadata.insert("status", MetadataValue::Scalar("archived".to_string()));
        writer.update_metadata(&rel, &fingerprint, &metadata).await.unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("p.md")).await.unwrap();
        assert_eq!(on_disk, "---\nstatus: archived\ntype: project\n---\n# p\n\n");
    }

    #[tokio::test]
    async fn stale_fingerprint_rejects_update() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "body\n").await;
        let writer = LineWriter::new(dir.path());
        let err = writer
            .update_metadata(&RelPath::new("p.md"), "not-the-real-fingerprint", &Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Stale { .. }));
    }

    #[tokio::test]
    async fn at_end_appends_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "").await;
        let writer = LineWriter::new(dir.path());
        writer
            .update_content(&RelPath::new("p.md"), None, &[LineMutation::add_at_end("- [ ] baz")])
            .await
            .unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("p.md")).await.unwrap();
        assert_eq!(on_disk, "- [ ] baz\n");
    }

    #[tokio::test]
    async fn at_begin_inserts_after_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "---\ntype: project\n---\n# p\n").await;
        let writer = LineWriter::new(dir.path());
        writer
            .update_content(&RelPath::new("p.md"), None, &[LineMutation::add_at_begin("intro")])
            .await
            .unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("p.md")).await.unwrap();
        assert_eq!(on_disk, "---\ntype: project\n---\nintro\n# p\n");
    }

    #[tokio::test]
    async fn spec_scenario_one_appends_task_at_end() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.md", "- [ ] foo\n- [ ] bar\n").await;
        let writer = LineWriter::new(dir.path());
        let rel = RelPath::new("a.md");
        let current = tokio::fs::read(dir.path().join("a.md")).await.unwrap();
        let fingerprint = Sha256Hasher.fingerprint(&current);

        writer
            .update_content(&rel, Some(&fingerprint), &[LineMutation::add_at_end("- [ ] baz")])
            .await
            .unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("a.md")).await.unwrap();
        assert_eq!(on_disk, "- [ ] foo\n- [ ] bar\n- [ ] baz\n");
    }

    #[tokio::test]
    async fn mutation_inside_front_matter_is_rejected_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "---\ntype: project\n---\nbody\n").await;
        let writer = LineWriter::new(dir.path());
        let rel = RelPath::new("p.md");
        let current = tokio::fs::read(dir.path().join("p.md")).await.unwrap();
        let fingerprint = Sha256Hasher.fingerprint(&current);

        let err = writer
            .update_content(&rel, Some(&fingerprint), &[LineMutation::Update { line: 2, text: "type: x".to_string() }])
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Bounds { .. }));

        let on_disk = tokio::fs::read_to_string(dir.path().join("p.md")).await.unwrap();
        assert_eq!(on_disk, "---\ntype: project\n---\nbody\n");
    }

    #[tokio::test]
    async fn text_with_newline_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "p.md", "body\n").await;
        let writer = LineWriter::new(dir.path());
        let err = writer
            .update_content(&RelPath::new("p.md"), None, &[LineMutation::add_at_end("line1\nline2")])
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Validation { .. }));
    }

    #[tokio::test]
    async fn rename_rejects_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.md", "a").await;
        write_file(dir.path(), "b.md", "b").await;
        let writer = LineWriter::new(dir.path());
        let err = writer.rename(&RelPath::new("a.md"), &RelPath::new("b.md")).await.unwrap_err();
        assert!(matches!(err, WriteError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn delete_of_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LineWriter::new(dir.path());
        writer.delete(&RelPath::new("missing.md")).await.unwrap();
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn line_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{0,12}".prop_filter("no leading/trailing noise", |s| s.trim() == s)
    }

    proptest! {
        // A run of AT_END adds must land in the order given, regardless of
        // how many lines already existed.
        #[test]
        fn sequential_at_end_adds_preserve_order(
            existing in prop::collection::vec(line_text(), 0..5),
            appended in prop::collection::vec(line_text(), 1..5),
        ) {
            let path = Path::new("p.md");
            let mutations: Vec<LineMutation> = appended.iter().cloned().map(LineMutation::add_at_end).collect();
            let mut lines = existing.clone();
            for mutation in &mutations {
                let resolved = match mutation {
                    LineMutation::Add { line, text } => {
                        let resolved = resolve_add_line(*line, &lines, None, path).unwrap();
                        lines.insert(resolved - 1, text.clone());
                        resolved
                    }
                    _ => unreachable!(),
                };
                prop_assert_eq!(resolved, lines.len());
            }
            let expected: Vec<String> = existing.into_iter().chain(appended).collect();
            assert_eq!(lines, expected);
        }
    }
}
