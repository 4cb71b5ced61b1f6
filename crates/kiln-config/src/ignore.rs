//! Default and user-supplied ignore patterns for the directory scanner and
//! recursive watcher.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{ConfigError, Result};

/// Patterns ignored unconditionally, regardless of user configuration.
///
/// These cover version-control metadata and the sync-tool churn directories
/// that would otherwise flood the watcher with irrelevant events.
pub const DEFAULT_IGNORED_PATTERNS: &[&str] = &[
    ".git/**",
    ".obsidian/**",
    ".stfolder/**",
    ".stversions/**",
    "**/.DS_Store",
];

/// Builds the combined [`GlobSet`] used to decide whether a path should be
/// skipped by the scanner and watcher: the [`DEFAULT_IGNORED_PATTERNS`] plus
/// whatever additional patterns the caller supplies.
pub fn build_ignore_set(extra: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORED_PATTERNS.iter().copied().chain(extra.iter().map(String::as_str)) {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::InvalidPattern {
        pattern: "<combined set>".to_string(),
        source,
    })
}
