//! Checksum verification of staged artifacts.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use cask_schema::{Checksum, HashAlgorithm, PackageName};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

use crate::Reporter;
use crate::io::fetch::StagedArtifact;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The digest matched.
    Verified {
        algorithm: HashAlgorithm,
        digest: String,
    },
    /// The manifest opted out of verification.
    Skipped,
}

impl Verification {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Digest to persist in the install record.
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Verified { digest, .. } => Some(digest),
            Self::Skipped => None,
        }
    }
}

/// A staged artifact whose bytes passed (or explicitly skipped) verification.
///
/// This is the only input the installer accepts.
#[derive(Debug)]
pub struct VerifiedArtifact {
    staged: StagedArtifact,
    verification: Verification,
}

impl VerifiedArtifact {
    pub fn path(&self) -> &Path {
        self.staged.path()
    }

    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    /// Delete the staged bytes.
    pub fn discard(self) {
        self.staged.discard();
    }
}

/// Hex digest of `bytes`.
pub fn digest_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    }
}

/// Hex digest of the file at `path`, streamed in fixed-size blocks.
pub fn digest_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<String> {
    let reader = BufReader::new(File::open(path)?);
    match algorithm {
        HashAlgorithm::Sha256 => stream_digest::<Sha256, _>(reader),
        HashAlgorithm::Sha512 => stream_digest::<Sha512, _>(reader),
    }
}

fn stream_digest<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn compare(
    expected: &str,
    actual: String,
    algorithm: HashAlgorithm,
) -> Result<Verification, IntegrityError> {
    if actual == expected {
        Ok(Verification::Verified {
            algorithm,
            digest: actual,
        })
    } else {
        Err(IntegrityError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Check in-memory bytes against `checksum`.
///
/// # Errors
///
/// Returns [`IntegrityError::ChecksumMismatch`] when the digests differ.
pub fn verify_bytes(bytes: &[u8], checksum: &Checksum) -> Result<Verification, IntegrityError> {
    match checksum {
        Checksum::Unchecked => Ok(Verification::Skipped),
        Checksum::Digest { algorithm, hex } => {
            compare(hex, digest_bytes(*algorithm, bytes), *algorithm)
        }
    }
}

/// Verify a staged artifact, consuming it.
///
/// On mismatch the staging directory is deleted before the error is returned.
/// An unchecked manifest is never silent: the skip is logged at warn level,
/// reported, and carried in the returned [`Verification`].
///
/// # Errors
///
/// Returns [`IntegrityError`] on mismatch or if the staged file cannot be read.
pub async fn verify(
    staged: StagedArtifact,
    checksum: &Checksum,
    name: &PackageName,
    reporter: &dyn Reporter,
) -> Result<VerifiedArtifact, IntegrityError> {
    let (algorithm, expected) = match checksum {
        Checksum::Unchecked => {
            tracing::warn!(package = %name, "checksum verification skipped (no_check)");
            reporter.warning(&format!(
                "{name}: manifest declares no_check, integrity not verified"
            ));
            return Ok(VerifiedArtifact {
                staged,
                verification: Verification::Skipped,
            });
        }
        Checksum::Digest { algorithm, hex } => (*algorithm, hex.clone()),
    };

    let path = staged.path().to_path_buf();
    let hashed = tokio::task::spawn_blocking(move || digest_file(algorithm, &path))
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);

    let actual = match hashed {
        Ok(actual) => actual,
        Err(e) => {
            staged.discard();
            return Err(e.into());
        }
    };

    match compare(&expected, actual, algorithm) {
        Ok(verification) => {
            tracing::debug!(package = %name, %algorithm, "checksum verified");
            Ok(VerifiedArtifact {
                staged,
                verification,
            })
        }
        Err(e) => {
            tracing::warn!(package = %name, error = %e, "discarding staged artifact");
            staged.discard();
            Err(e)
        }
    }
}
