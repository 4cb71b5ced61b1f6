//! Root-path resolution helpers.

use std::path::{Path, PathBuf};

/// Expands a leading `~` or `~/` in a user-supplied root path to the
/// current user's home directory, leaving any other path untouched.
///
/// Falls back to returning `path` unexpanded if the home directory cannot
/// be determined, the same permissive fallback [`crate::client_identity`]
/// uses for an unresolvable hostname.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return if path == "~" { home } else { home.join(&path[2..]) };
        }
    }
    PathBuf::from(path)
}

/// True if `path` is exactly the user's home directory. Roots resolving to
/// the bare home directory are conventionally worth a warning one layer up
/// (scanning `~` recursively is rarely what a caller wants), so this is
/// exposed as a standalone predicate rather than baked into
/// [`expand_tilde`].
pub fn is_home_dir(path: &Path) -> bool {
    dirs::home_dir().is_some_and(|home| path == home)
}
