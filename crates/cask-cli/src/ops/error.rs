//! Errors surfaced by the install pipeline.
//!
//! Component errors pass through untranslated; the pipeline only adds which
//! stage failed and for which package.

use std::path::PathBuf;

use cask_core::StoreError;
use cask_core::io::fetch::FetchError;
use cask_core::io::verify::IntegrityError;
use cask_core::installer::InstallError;
use cask_schema::ManifestError;
use thiserror::Error;

use super::pipeline::Stage;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
#[error("{stage} failed for {package}: {source}")]
pub struct PipelineError {
    /// Stage that was running when the failure happened.
    pub stage: Stage,
    /// Package name, or the manifest location if it never parsed.
    pub package: String,
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, package: impl Into<String>, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            package: package.into(),
            source: source.into(),
        }
    }
}
