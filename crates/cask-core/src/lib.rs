//! Core library for cask.
//!
//! Everything with side effects lives here: fetching artifacts over HTTP,
//! verifying their integrity, placing bundles on disk and persisting install
//! records. The manifest model itself lives in `cask-schema`.

pub mod config;
pub mod installer;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod store;

pub use config::{CaskConfig, FetchConfig};
pub use installer::{InstallError, InstallOptions, Installer};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};
pub use store::{DbHandle, MemoryStore, PackageLocks, RecordStore, StoreError};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("cask/", env!("CARGO_PKG_VERSION"));
