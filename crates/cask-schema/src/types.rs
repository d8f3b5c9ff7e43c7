use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;

use crate::LATEST;

/// Display name of a package; also the key of its install record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Create a package name. Emptiness is checked by manifest validation, not here.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name contains any non-whitespace character.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Version declared by a manifest.
///
/// `Latest` is the sentinel for downloads whose URL always serves the newest
/// release; it is kept distinct from literal strings so callers have to
/// handle it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// A concrete version string such as `1.2.0`.
    Literal(String),
    /// The `latest` sentinel.
    Latest,
}

impl Version {
    /// Map a raw manifest value to a version, recognising the `latest` sentinel.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == LATEST {
            Self::Latest
        } else {
            Self::Literal(raw.to_string())
        }
    }

    /// The literal version, or `None` for `latest`.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Latest => None,
        }
    }

    /// Whether this is the `latest` sentinel.
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.write_str(v),
            Self::Latest => f.write_str(LATEST),
        }
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
