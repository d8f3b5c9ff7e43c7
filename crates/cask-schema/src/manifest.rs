//! Manifest parsing and validation.
//!
//! A manifest describes how to fetch and install one application: its
//! display name, version, download URL, integrity policy, homepage and the
//! relative path of the bundle to install from the downloaded artifact.
//!
//! Two source syntaxes are accepted and produce the same [`Manifest`]:
//!
//! ```toml
//! name = "Example"
//! version = "1.2.0"
//! url = "https://example.test/app.zip"
//! sha256 = "<64 hex chars>"
//! homepage = "https://example.test/"
//! app = "Example.app"
//! ```
//!
//! and the cask DSL subset handled by [`crate::dsl`].

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::dsl;
use crate::hash::{Checksum, HashAlgorithm};
use crate::types::{PackageName, Version};
use crate::NO_CHECK;

/// Errors raised while turning a manifest source into a [`Manifest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The source is syntactically broken, misses a required key, or holds a
    /// value that cannot be interpreted.
    #[error("malformed manifest: {field}: {message}")]
    Malformed {
        /// Offending key (or `document` for syntax errors).
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// A constructed manifest violates an invariant.
    #[error("invalid manifest: {field}: {message}")]
    Invalid {
        /// Offending field.
        field: String,
        /// Human-readable reason.
        message: String,
    },
}

impl ManifestError {
    pub(crate) fn malformed(field: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Malformed { field, .. } | Self::Invalid { field, .. } => field,
        }
    }
}

/// Install instructions for one package. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Display name; also the install record key.
    pub name: PackageName,
    /// Declared version or the `latest` sentinel.
    pub version: Version,
    /// Fully resolved download location.
    pub url: Url,
    /// Integrity policy for the downloaded bytes.
    pub checksum: Checksum,
    /// Informational project homepage.
    pub homepage: Option<String>,
    /// Path of the bundle inside the fetched artifact, relative to its root.
    pub install_target: PathBuf,
}

/// Key/value view of a manifest source before typing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawManifest {
    pub(crate) name: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) sha256: Option<String>,
    pub(crate) sha512: Option<String>,
    pub(crate) homepage: Option<String>,
    pub(crate) app: Option<String>,
}

impl Manifest {
    /// Parse a manifest source, auto-detecting TOML or the cask DSL.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Malformed`] when the source cannot be parsed,
    /// a required key is missing, the URL is not a valid `http(s)` URI, the
    /// checksum is neither a recognised digest nor `no_check`, or the install
    /// target is not a plain relative path.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let raw_manifest = if dsl::looks_like_dsl(raw) {
            dsl::parse(raw)?
        } else {
            toml::from_str::<RawManifest>(raw).map_err(|e| {
                ManifestError::malformed("document", e.message().trim().to_string())
            })?
        };

        Self::from_raw(raw_manifest)
    }

    pub(crate) fn from_raw(raw: RawManifest) -> Result<Self, ManifestError> {
        let name = required(raw.name, "name")?;
        let version = required(raw.version, "version")?;
        let url_str = required(raw.url, "url")?;
        let app = required(raw.app, "app")?;

        let url = Url::parse(&url_str)
            .map_err(|e| ManifestError::malformed("url", format!("'{url_str}': {e}")))?;
        check_url(&url).map_err(|m| ManifestError::malformed("url", m))?;

        let checksum = match (raw.sha256, raw.sha512) {
            (Some(_), Some(_)) => {
                return Err(ManifestError::malformed(
                    "checksum",
                    "declare exactly one of sha256 or sha512",
                ));
            }
            (Some(s), None) => parse_checksum(HashAlgorithm::Sha256, &s)?,
            (None, Some(s)) => parse_checksum(HashAlgorithm::Sha512, &s)?,
            (None, None) => {
                return Err(ManifestError::malformed(
                    "sha256",
                    "missing required key (use \"no_check\" to skip verification)",
                ));
            }
        };

        let install_target = PathBuf::from(app.trim());
        check_install_target(&install_target).map_err(|m| ManifestError::malformed("app", m))?;

        let manifest = Self {
            name: PackageName::new(name.trim()),
            version: Version::parse(&version),
            url,
            checksum,
            homepage: raw.homepage.filter(|h| !h.trim().is_empty()),
            install_target,
        };

        manifest.validate()?;
        Ok(manifest)
    }

    /// Re-check every invariant, independent of how the value was built.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.is_blank() {
            return Err(ManifestError::invalid("name", "must not be empty"));
        }

        if let Version::Literal(v) = &self.version {
            if v.trim().is_empty() {
                return Err(ManifestError::invalid("version", "must not be empty"));
            }
        }

        check_url(&self.url).map_err(|m| ManifestError::invalid("url", m))?;

        if let Checksum::Digest { algorithm, hex } = &self.checksum {
            if hex.len() != algorithm.hex_len() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ManifestError::invalid(
                    algorithm.as_str(),
                    format!(
                        "digest must be {} hex characters, got '{hex}'",
                        algorithm.hex_len()
                    ),
                ));
            }
        }

        check_install_target(&self.install_target)
            .map_err(|m| ManifestError::invalid("app", m))?;

        Ok(())
    }

    /// Final path component of the install target (e.g. `Example.app`).
    pub fn bundle_name(&self) -> &std::ffi::OsStr {
        // validate() guarantees a normal final component
        self.install_target
            .file_name()
            .unwrap_or(self.install_target.as_os_str())
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, ManifestError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(ManifestError::malformed(key, "must not be empty")),
        None => Err(ManifestError::malformed(key, "missing required key")),
    }
}

fn parse_checksum(algorithm: HashAlgorithm, raw: &str) -> Result<Checksum, ManifestError> {
    if raw.trim() == NO_CHECK {
        return Ok(Checksum::Unchecked);
    }
    Checksum::digest(algorithm, raw).map_err(|m| ManifestError::malformed(algorithm.as_str(), m))
}

fn check_url(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}' (expected http or https)")),
    }
    if !url.has_host() {
        return Err(format!("'{url}' has no host"));
    }
    Ok(())
}

fn check_install_target(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("must not be empty".to_string());
    }

    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("'{}' must not contain '..'", path.display()));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("'{}' must be a relative path", path.display()));
            }
        }
    }

    if normal == 0 || path.file_name().is_none() {
        return Err(format!("'{}' does not name a bundle", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    fn example_toml() -> String {
        format!(
            r#"
name = "Example"
version = "1.2.0"
url = "https://example.test/app.zip"
sha256 = "{DIGEST}"
homepage = "https://example.test/"
app = "Example.app"
"#
        )
    }

    #[test]
    fn parses_complete_toml_manifest() {
        let m = Manifest::parse(&example_toml()).unwrap();
        assert_eq!(m.name.as_str(), "Example");
        assert_eq!(m.version, Version::Literal("1.2.0".to_string()));
        assert_eq!(m.url.as_str(), "https://example.test/app.zip");
        assert_eq!(m.checksum.expected_hex(), Some(DIGEST));
        assert_eq!(m.homepage.as_deref(), Some("https://example.test/"));
        assert_eq!(m.install_target, PathBuf::from("Example.app"));
        assert_eq!(m.bundle_name(), "Example.app");
    }

    #[test]
    fn sentinels_become_tagged_variants() {
        let m = Manifest::parse(
            r#"
name = "Grammarly"
version = "latest"
url = "https://download-editor.grammarly.com/osx/Grammarly.dmg"
sha256 = "no_check"
app = "Grammarly.app"
"#,
        )
        .unwrap();
        assert_eq!(m.version, Version::Latest);
        assert_eq!(m.checksum, Checksum::Unchecked);
        assert!(m.homepage.is_none());
    }

    #[test]
    fn missing_required_keys_are_malformed() {
        for key in ["name", "version", "url", "app"] {
            let source: String = example_toml()
                .lines()
                .filter(|l| !l.starts_with(&format!("{key} =")))
                .collect::<Vec<_>>()
                .join("\n");
            let err = Manifest::parse(&source).unwrap_err();
            assert!(
                matches!(&err, ManifestError::Malformed { field, .. } if field == key),
                "expected malformed {key}, got {err:?}"
            );
        }
    }

    #[test]
    fn missing_checksum_is_malformed() {
        let source = example_toml().replace(&format!("sha256 = \"{DIGEST}\""), "");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "sha256");
    }

    #[test]
    fn unparseable_url_is_malformed() {
        let source = example_toml().replace("https://example.test/app.zip", "not a url");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "url");

        let source = example_toml().replace("https://", "ftp://");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "url");
    }

    #[test]
    fn unrecognised_checksum_is_malformed() {
        let source = example_toml().replace(DIGEST, "deadbeef");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "sha256");

        let source = example_toml().replace(DIGEST, "skip");
        assert!(Manifest::parse(&source).is_err());
    }

    #[test]
    fn two_digests_are_rejected() {
        let source = format!("{}\nsha512 = \"{}\"\n", example_toml(), "a".repeat(128));
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "checksum");
    }

    #[test]
    fn sha512_digest_is_accepted() {
        let source = example_toml().replace(
            &format!("sha256 = \"{DIGEST}\""),
            &format!("sha512 = \"{}\"", "ab".repeat(64)),
        );
        let m = Manifest::parse(&source).unwrap();
        assert!(matches!(
            m.checksum,
            Checksum::Digest {
                algorithm: HashAlgorithm::Sha512,
                ..
            }
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let source = format!("{}\ndepends_on = \"macos\"\n", example_toml());
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "document");
    }

    #[test]
    fn escaping_install_targets_are_rejected() {
        for bad in ["../Evil.app", "/Applications/Evil.app", ".", "Apps/../../x"] {
            let source = example_toml().replace("\"Example.app\"", &format!("\"{bad}\""));
            let err = Manifest::parse(&source).unwrap_err();
            assert_eq!(err.field(), "app", "{bad} should be rejected");
        }

        let nested = example_toml().replace("\"Example.app\"", "\"Example/Example.app\"");
        let m = Manifest::parse(&nested).unwrap();
        assert_eq!(m.bundle_name(), "Example.app");
    }

    #[test]
    fn validate_catches_hand_built_instances() {
        let good = Manifest::parse(&example_toml()).unwrap();
        assert!(good.validate().is_ok());

        let mut m = good.clone();
        m.name = PackageName::new("");
        assert!(matches!(m.validate(), Err(ManifestError::Invalid { .. })));

        let mut m = good.clone();
        m.checksum = Checksum::Digest {
            algorithm: HashAlgorithm::Sha256,
            hex: "abc".to_string(),
        };
        assert_eq!(m.validate().unwrap_err().field(), "sha256");

        let mut m = good.clone();
        m.url = Url::parse("file:///tmp/app.zip").unwrap();
        assert_eq!(m.validate().unwrap_err().field(), "url");

        let mut m = good.clone();
        m.install_target = PathBuf::new();
        assert_eq!(m.validate().unwrap_err().field(), "app");

        let mut m = good;
        m.version = Version::Literal(String::new());
        assert_eq!(m.validate().unwrap_err().field(), "version");
    }

    #[test]
    fn syntax_errors_are_malformed() {
        let err = Manifest::parse("name = ").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }));
    }
}
