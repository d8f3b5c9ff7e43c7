//! User configuration loaded from `~/.cask/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::io::retry::RetryPolicy;

/// Network parameters for the fetcher (`[fetch]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of attempts per download (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Timeout for one attempt, in seconds.
    pub timeout_secs: u64,
    /// Timeout for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_secs: 600,
            connect_timeout_secs: 30,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Backoff policy described by this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Global configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaskConfig {
    /// Where application bundles are installed (overrides the default).
    pub appdir: Option<PathBuf>,
    /// Fetcher settings.
    pub fetch: FetchConfig,
}

impl CaskConfig {
    /// Load configuration from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let data =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self =
            toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Load configuration from `~/.cask/config.toml`.
    ///
    /// # Errors
    ///
    /// See [`CaskConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(&crate::config_path())
    }

    /// Applications directory: explicit config value, else the platform default.
    pub fn applications_dir(&self) -> PathBuf {
        self.appdir
            .clone()
            .unwrap_or_else(crate::default_applications_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = CaskConfig::default();
        assert_eq!(cfg.fetch.max_attempts, 3);
        assert_eq!(cfg.fetch.base_delay_ms, 500);
        assert_eq!(cfg.fetch.max_redirects, 5);
        assert!(cfg.appdir.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "appdir = \"/tmp/apps\"\n[fetch]\nmax_attempts = 5\n").unwrap();

        let cfg = CaskConfig::load_from(&path).unwrap();
        assert_eq!(cfg.appdir, Some(PathBuf::from("/tmp/apps")));
        assert_eq!(cfg.fetch.max_attempts, 5);
        assert_eq!(cfg.fetch.timeout_secs, 600);
        assert_eq!(cfg.applications_dir(), PathBuf::from("/tmp/apps"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaskConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, CaskConfig::default());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "fetch = 3").unwrap();
        assert!(CaskConfig::load_from(&path).is_err());
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = FetchConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
