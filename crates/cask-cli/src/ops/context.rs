//! Shared installation context.
//!
//! Groups the long-lived components an install run needs. Everything is
//! behind an `Arc` or is cheaply cloneable, so one `Context` can serve many
//! concurrent pipelines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use cask_core::io::fetch::{FetchError, Fetcher};
use cask_core::{CaskConfig, DbHandle, FetchConfig, Installer, RecordStore, Reporter};

#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn RecordStore>,
    pub fetcher: Fetcher,
    pub installer: Arc<Installer>,
    pub reporter: Arc<dyn Reporter>,
}

impl Context {
    pub fn new(
        fetch: &FetchConfig,
        store: Arc<dyn RecordStore>,
        applications_dir: PathBuf,
        staging_root: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(fetch, staging_root)?;
        let installer = Arc::new(Installer::new(store.clone(), applications_dir));
        Ok(Self {
            store,
            fetcher,
            installer,
            reporter,
        })
    }

    /// Context over the on-disk state database under the cask home.
    pub fn open(
        config: &CaskConfig,
        applications_dir: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let db = DbHandle::spawn().context("Failed to open state database")?;
        Self::new(
            &config.fetch,
            Arc::new(db),
            applications_dir,
            cask_core::tmp_path(),
            reporter,
        )
        .context("Failed to set up HTTP client")
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("fetcher", &self.fetcher)
            .field("applications_dir", &self.installer.applications_dir())
            .finish_non_exhaustive()
    }
}
