use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PackageName, Version};

/// Persisted evidence of a completed installation.
///
/// Exactly one record exists per package name; a new install supersedes the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Name of the installed package.
    pub package_name: PackageName,
    /// Version declared by the manifest that produced this install.
    pub installed_version: Version,
    /// Absolute path of the installed bundle.
    pub installed_path: PathBuf,
    /// Hex digest that was verified, or `None` when the manifest opted out.
    pub source_checksum: Option<String>,
    /// When the install was committed.
    pub installed_at: DateTime<Utc>,
}

impl InstallRecord {
    /// Whether two records describe the same installation, ignoring when it happened.
    pub fn same_install(&self, other: &Self) -> bool {
        self.package_name == other.package_name
            && self.installed_version == other.installed_version
            && self.installed_path == other.installed_path
            && self.source_checksum == other.source_checksum
    }
}

/// Kind of state change recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// A record was written.
    Install,
    /// A record was deleted.
    Remove,
}

impl HistoryAction {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }

    /// Inverse of [`HistoryAction::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(Self::Install),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// One entry of a package's install history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub action: HistoryAction,
    /// Package the event belongs to.
    pub package: PackageName,
    /// Version recorded before the change, if any.
    pub version_from: Option<String>,
    /// Version recorded after the change, if any.
    pub version_to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InstallRecord {
        InstallRecord {
            package_name: PackageName::new("Example"),
            installed_version: Version::parse("1.2.0"),
            installed_path: PathBuf::from("/Applications/Example.app"),
            source_checksum: Some("ab".repeat(32)),
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn same_install_ignores_timestamp() {
        let a = record();
        let mut b = a.clone();
        b.installed_at = a.installed_at + chrono::Duration::seconds(30);
        assert!(a.same_install(&b));

        b.installed_version = Version::Latest;
        assert!(!a.same_install(&b));
    }

    #[test]
    fn record_serializes_version_as_string() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["installed_version"], "1.2.0");
        assert_eq!(json["package_name"], "Example");
    }
}
