//! cask - install desktop applications from declarative manifests
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! # Overview
//!
//! A manifest names one application, where to download it, the checksum its
//! bytes must match and the bundle to place in the applications directory.
//! `cask install` runs it through a fixed pipeline:
//!
//! ```text
//! Idle -> Parsing -> Fetching -> Verifying -> Installing -> Done
//!                 (any stage may end in Failed)
//! ```
//!
//! # Architecture
//!
//! - **Typestate**: the fetcher yields a `StagedArtifact`, the verifier turns
//!   it into a `VerifiedArtifact`, and only the latter is accepted by the
//!   installer.
//! - **Actor**: the SQLite record store is owned by one thread behind
//!   `DbHandle`.
//! - **Per-package locks**: concurrent installs of different packages proceed
//!   in parallel; the same package is serialised.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.cask/
//! ├── config.toml # Optional settings
//! ├── tmp/        # Download staging
//! └── state.db    # SQLite install records + history
//! ```

pub mod cmd;
pub mod ops;
pub mod ui;

pub use cask_core::paths::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cask")]
#[command(author, version, about = "cask - install desktop applications from manifests")]
pub struct Cli {
    /// Install bundles into this directory
    #[arg(long, global = true, env = "CASK_APPDIR", value_name = "DIR")]
    pub appdir: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install an application from a manifest file
    Install {
        /// Path to the manifest (TOML or cask DSL)
        manifest: PathBuf,
        /// Replace an existing bundle that cask did not install
        #[arg(long)]
        allow_overwrite: bool,
        /// Fetch and install again even if the same version is present
        #[arg(long)]
        reinstall: bool,
        /// Not supported: checksum policy comes from the manifest only
        #[arg(long, hide = true)]
        force_unchecked: bool,
    },
    /// Remove an installed application
    Remove {
        /// Package name
        name: String,
    },
    /// List installed applications
    List,
    /// Show the install record of a package
    Info {
        /// Package name
        name: String,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// View package history
    History {
        /// Package name
        name: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
