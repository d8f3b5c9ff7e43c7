use dirs::home_dir;
use std::path::PathBuf;

/// Returns the state directory, or None if the user's home cannot be resolved.
pub fn try_cask_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os("CASK_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".cask"))
}

/// Returns the canonical cask home directory (`~/.cask`).
///
/// # Panics
///
/// Panics if neither `CASK_HOME` is set nor the user's home directory can be
/// resolved.
pub fn cask_home() -> PathBuf {
    try_cask_home().expect("Could not determine home directory. Set CASK_HOME to override.")
}

/// `SQLite` database path: ~/.cask/state.db
pub fn db_path() -> PathBuf {
    cask_home().join("state.db")
}

/// Config file path: ~/.cask/config.toml
pub fn config_path() -> PathBuf {
    cask_home().join("config.toml")
}

/// Staging area for downloads: ~/.cask/tmp
pub fn tmp_path() -> PathBuf {
    cask_home().join("tmp")
}

/// Default destination for application bundles.
///
/// `CASK_APPDIR` wins; otherwise `~/Applications`, matching a per-user install.
pub fn default_applications_dir() -> PathBuf {
    if let Some(val) = std::env::var_os("CASK_APPDIR") {
        return PathBuf::from(val);
    }
    home_dir().map_or_else(|| PathBuf::from("/Applications"), |h| h.join("Applications"))
}

/// Extract the filename from a URL path.
pub fn filename_from_url(url: &url::Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
}
