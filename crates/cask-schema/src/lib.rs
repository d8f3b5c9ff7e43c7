//! Shared types for cask.
//!
//! This crate holds the pure data model: the parsed [`Manifest`] describing
//! how to fetch and install one application, and the [`InstallRecord`] that
//! evidences a completed installation. It performs no IO.

pub mod dsl;
pub mod hash;
pub mod manifest;
pub mod record;
pub mod types;

// Re-exports
pub use hash::{Checksum, HashAlgorithm};
pub use manifest::{Manifest, ManifestError};
pub use record::{HistoryAction, HistoryEvent, InstallRecord};
pub use types::{PackageName, Version};

/// Literal used by manifests to opt out of checksum verification.
pub const NO_CHECK: &str = "no_check";

/// Literal used by manifests whose download always points at the newest release.
pub const LATEST: &str = "latest";
