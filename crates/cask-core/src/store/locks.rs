//! Per-package install locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use cask_schema::PackageName;
use tokio::sync::OwnedMutexGuard;

/// Serialises installs of the same package name; different names never contend.
#[derive(Debug, Clone, Default)]
pub struct PackageLocks {
    inner: Arc<Mutex<HashMap<PackageName, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Held for the duration of an install or uninstall.
#[derive(Debug)]
pub struct PackageGuard {
    _guard: OwnedMutexGuard<()>,
}

impl PackageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn acquire(&self, name: &PackageName) -> PackageGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // drop entries nobody holds or waits on
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(name.clone()).or_default())
        };
        PackageGuard {
            _guard: lock.lock_owned().await,
        }
    }
}
