use serde::{Deserialize, Serialize};
use std::fmt;

/// Digest algorithms a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (the `sha256` key).
    Sha256,
    /// SHA-512 (the `sha512` key).
    Sha512,
}

impl HashAlgorithm {
    /// Number of hex characters in a digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Manifest key and digest prefix for this algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integrity policy of a manifest: a declared digest, or an explicit opt-out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Fetched bytes must hash to `hex` under `algorithm`.
    Digest {
        /// Algorithm the digest was computed with.
        algorithm: HashAlgorithm,
        /// Lowercase hex digest.
        hex: String,
    },
    /// `no_check`: verification is skipped by the manifest author's decision.
    Unchecked,
}

impl Checksum {
    /// Create a validated digest checksum.
    ///
    /// Accepts strings with or without an `<algorithm>:` prefix and normalises
    /// the hex to lowercase.
    ///
    /// # Errors
    ///
    /// Returns a message if the hex portion has the wrong length for the
    /// algorithm or contains non-hex characters.
    pub fn digest(algorithm: HashAlgorithm, s: &str) -> Result<Self, String> {
        let s = s.trim();
        let prefix = format!("{}:", algorithm.as_str());
        let hex = s.strip_prefix(prefix.as_str()).unwrap_or(s);

        if hex.len() != algorithm.hex_len() {
            return Err(format!(
                "invalid {algorithm} digest: expected {} hex characters, got {} in '{s}'",
                algorithm.hex_len(),
                hex.len(),
            ));
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "invalid {algorithm} digest: contains non-hex characters in '{s}'"
            ));
        }

        Ok(Self::Digest {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Whether this is the `no_check` policy.
    pub fn is_unchecked(&self) -> bool {
        matches!(self, Self::Unchecked)
    }

    /// The declared hex digest, if any.
    pub fn expected_hex(&self) -> Option<&str> {
        match self {
            Self::Digest { hex, .. } => Some(hex),
            Self::Unchecked => None,
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { algorithm, hex } => write!(f, "{algorithm}:{hex}"),
            Self::Unchecked => f.write_str(crate::NO_CHECK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn digest_accepts_prefix_and_normalises_case() {
        let upper = HELLO_SHA256.to_ascii_uppercase();
        let c = Checksum::digest(HashAlgorithm::Sha256, &format!("sha256:{upper}")).unwrap();
        assert_eq!(c.expected_hex(), Some(HELLO_SHA256));
        assert_eq!(c.to_string(), format!("sha256:{HELLO_SHA256}"));
    }

    #[test]
    fn digest_rejects_wrong_length() {
        let err = Checksum::digest(HashAlgorithm::Sha256, "abc123").unwrap_err();
        assert!(err.contains("expected 64"));

        // A valid sha256 is too short for sha512
        assert!(Checksum::digest(HashAlgorithm::Sha512, HELLO_SHA256).is_err());
    }

    #[test]
    fn digest_rejects_non_hex() {
        let bad = "z".repeat(64);
        let err = Checksum::digest(HashAlgorithm::Sha256, &bad).unwrap_err();
        assert!(err.contains("non-hex"));
    }

    #[test]
    fn unchecked_has_no_expected_digest() {
        assert!(Checksum::Unchecked.is_unchecked());
        assert_eq!(Checksum::Unchecked.expected_hex(), None);
        assert_eq!(Checksum::Unchecked.to_string(), "no_check");
    }
}
