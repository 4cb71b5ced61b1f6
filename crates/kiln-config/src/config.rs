//! Root configuration: note-root resolution, worker-pool sizing, timing
//! knobs, and ignore patterns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::GlobSet;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::identity::client_identity;
use crate::ignore::build_ignore_set;
use crate::paths::expand_tilde;

const DEFAULT_WORKER_POOL_PERMITS: usize = 1_000;
const DEFAULT_ENSURE_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 2_000;

/// On-disk shape of `<root>/.kiln/config.toml`. Every field is optional so a
/// partially-specified file only overrides what it mentions.
#[cfg(feature = "toml")]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawConfig {
    pub worker_pool_permits: Option<usize>,
    pub ensure_poll_interval_ms: Option<u64>,
    pub watch_debounce_ms: Option<u64>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Resolved configuration for a single kiln note root.
///
/// Built either directly via [`KilnConfig::new`] (defaults only, no disk
/// access) or via [`KilnConfig::load`], which additionally reads
/// `<root>/.kiln/config.toml` and layers environment-variable overrides on
/// top.
#[derive(Debug, Clone)]
pub struct KilnConfig {
    root: PathBuf,
    client_identity: String,
    worker_pool_permits: usize,
    ensure_poll_interval: Duration,
    watch_debounce: Duration,
    ignore: GlobSet,
}

impl KilnConfig {
    /// Builds a configuration for `root` using only defaults, validating
    /// that `root` exists and is a directory.
    pub fn new(root: impl Into<PathBuf>, app_label: &str) -> Result<Self> {
        let root = validate_root(root.into())?;
        let ignore = build_ignore_set(&[])?;
        Ok(Self {
            root,
            client_identity: client_identity(app_label),
            worker_pool_permits: DEFAULT_WORKER_POOL_PERMITS,
            ensure_poll_interval: Duration::from_millis(DEFAULT_ENSURE_POLL_INTERVAL_MS),
            watch_debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
            ignore,
        })
    }

    /// Builds a configuration for `root`, additionally reading
    /// `<root>/.kiln/config.toml` if present and applying environment
    /// overrides (`KILN_WORKER_POOL_PERMITS`, `KILN_ENSURE_POLL_INTERVAL_MS`,
    /// `KILN_WATCH_DEBOUNCE_MS`).
    #[cfg(feature = "toml")]
    pub fn load(root: impl Into<PathBuf>, app_label: &str) -> Result<Self> {
        let root = validate_root(root.into())?;
        let config_path = root.join(".kiln").join("config.toml");
        let raw = if config_path.is_file() {
            let text = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;
            toml::from_str::<RawConfig>(&text).map_err(|source| ConfigError::Toml {
                path: config_path.clone(),
                source,
            })?
        } else {
            RawConfig::default()
        };

        let worker_pool_permits = env_override_usize("KILN_WORKER_POOL_PERMITS")?
            .or(raw.worker_pool_permits)
            .unwrap_or(DEFAULT_WORKER_POOL_PERMITS);
        let ensure_poll_interval_ms = env_override_u64("KILN_ENSURE_POLL_INTERVAL_MS")?
            .or(raw.ensure_poll_interval_ms)
            .unwrap_or(DEFAULT_ENSURE_POLL_INTERVAL_MS);
        let watch_debounce_ms = env_override_u64("KILN_WATCH_DEBOUNCE_MS")?
            .or(raw.watch_debounce_ms)
            .unwrap_or(DEFAULT_WATCH_DEBOUNCE_MS);

        let ignore = build_ignore_set(&raw.ignore_patterns)?;

        Ok(Self {
            root,
            client_identity: client_identity(app_label),
            worker_pool_permits,
            ensure_poll_interval: Duration::from_millis(ensure_poll_interval_ms),
            watch_debounce: Duration::from_millis(watch_debounce_ms),
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    pub fn worker_pool_permits(&self) -> usize {
        self.worker_pool_permits
    }

    pub fn ensure_poll_interval(&self) -> Duration {
        self.ensure_poll_interval
    }

    pub fn watch_debounce(&self) -> Duration {
        self.watch_debounce
    }

    pub fn ignore_set(&self) -> &GlobSet {
        &self.ignore
    }
}

fn validate_root(root: PathBuf) -> Result<PathBuf> {
    let root = match root.to_str() {
        Some(raw) if raw.starts_with('~') => expand_tilde(raw),
        _ => root,
    };
    if !root.exists() {
        return Err(ConfigError::RootNotFound(root));
    }
    if !root.is_dir() {
        return Err(ConfigError::RootNotADirectory(root));
    }
    Ok(root)
}

fn env_override_usize(var: &'static str) -> Result<Option<usize>> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvOverride {
                var,
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_override_u64(var: &'static str) -> Result<Option<u64>> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvOverride {
                var,
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn new_rejects_missing_root() {
        let err = KilnConfig::new("/no/such/kiln/root", "kiln-test").unwrap_err();
        assert!(matches!(err, ConfigError::RootNotFound(_)));
    }

    #[test]
    fn new_expands_a_leading_tilde() {
        let Some(home) = dirs::home_dir() else { return };
        let cfg = KilnConfig::new("~", "kiln-test").unwrap();
        assert_eq!(cfg.root(), home);
    }

    #[test]
    fn new_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = KilnConfig::new(dir.path(), "kiln-test").unwrap();
        assert_eq!(cfg.worker_pool_permits(), DEFAULT_WORKER_POOL_PERMITS);
        assert_eq!(cfg.watch_debounce(), Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS));
        assert!(cfg.ignore_set().is_match(".git/HEAD"));
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let kiln_dir = dir.path().join(".kiln");
        fs::create_dir_all(&kiln_dir).unwrap();
        fs::write(
            kiln_dir.join("config.toml"),
            "worker-pool-permits = 42\nignore-patterns = [\"vendor/**\"]\n",
        )
        .unwrap();

        let cfg = KilnConfig::load(dir.path(), "kiln-test").unwrap();
        assert_eq!(cfg.worker_pool_permits(), 42);
        assert!(cfg.ignore_set().is_match("vendor/thing.md"));
    }

    #[test]
    #[serial]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let kiln_dir = dir.path().join(".kiln");
        fs::create_dir_all(&kiln_dir).unwrap();
        fs::write(kiln_dir.join("config.toml"), "worker-pool-permits = 42\n").unwrap();

        std::env::set_var("KILN_WORKER_POOL_PERMITS", "7");
        let cfg = KilnConfig::load(dir.path(), "kiln-test").unwrap();
        std::env::remove_var("KILN_WORKER_POOL_PERMITS");

        assert_eq!(cfg.worker_pool_permits(), 7);
    }
}
