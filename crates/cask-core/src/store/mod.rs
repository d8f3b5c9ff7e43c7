//! Install record persistence.
//!
//! [`RecordStore`] is the seam the installer writes through. The production
//! implementation is [`DbHandle`], an actor owning a SQLite [`StateDb`];
//! [`MemoryStore`] backs tests and embedders that need no persistence.

mod actor;
mod db;
mod locks;
mod memory;

pub use actor::DbHandle;
pub use db::StateDb;
pub use locks::{PackageGuard, PackageLocks};
pub use memory::MemoryStore;

use async_trait::async_trait;
use cask_schema::{HistoryEvent, InstallRecord, PackageName};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt record for {name}: {message}")]
    Corrupt { name: String, message: String },

    #[error("Database actor stopped")]
    ActorDied,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keyed storage of [`InstallRecord`]s, one per package name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current record for `name`.
    async fn get(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError>;

    /// Write `record`, superseding any previous record for the same name.
    ///
    /// The write and its history entry are committed together or not at all.
    async fn put(&self, record: &InstallRecord) -> Result<(), StoreError>;

    /// Delete the record for `name`, returning it if one existed.
    async fn remove(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError>;

    /// All records, ordered by name.
    async fn list(&self) -> Result<Vec<InstallRecord>, StoreError>;

    /// Install/remove events for `name`, oldest first.
    async fn history(&self, name: &PackageName) -> Result<Vec<HistoryEvent>, StoreError>;
}
