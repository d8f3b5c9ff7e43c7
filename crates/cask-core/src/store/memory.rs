use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cask_schema::{HistoryAction, HistoryEvent, InstallRecord, PackageName};

use super::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<PackageName, InstallRecord>,
    history: Vec<HistoryEvent>,
}

/// In-process [`RecordStore`] with the same supersede and history semantics
/// as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError> {
        Ok(self.lock().records.get(name).cloned())
    }

    async fn put(&self, record: &InstallRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let previous = inner
            .records
            .insert(record.package_name.clone(), record.clone());
        inner.history.push(HistoryEvent {
            timestamp: record.installed_at,
            action: HistoryAction::Install,
            package: record.package_name.clone(),
            version_from: previous.map(|r| r.installed_version.to_string()),
            version_to: Some(record.installed_version.to_string()),
        });
        Ok(())
    }

    async fn remove(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError> {
        let mut inner = self.lock();
        let removed = inner.records.remove(name);
        if let Some(record) = &removed {
            inner.history.push(HistoryEvent {
                timestamp: chrono::Utc::now(),
                action: HistoryAction::Remove,
                package: name.clone(),
                version_from: Some(record.installed_version.to_string()),
                version_to: None,
            });
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<InstallRecord>, StoreError> {
        Ok(self.lock().records.values().cloned().collect())
    }

    async fn history(&self, name: &PackageName) -> Result<Vec<HistoryEvent>, StoreError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|e| &e.package == name)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_schema::Version;
    use std::path::PathBuf;

    #[tokio::test]
    async fn supersedes_and_records_history() {
        let store = MemoryStore::new();
        let name = PackageName::new("Example");
        let mut rec = InstallRecord {
            package_name: name.clone(),
            installed_version: Version::parse("1.0"),
            installed_path: PathBuf::from("/Applications/Example.app"),
            source_checksum: None,
            installed_at: chrono::Utc::now(),
        };
        store.put(&rec).await.unwrap();
        rec.installed_version = Version::parse("2.0");
        store.put(&rec).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![rec.clone()]);
        assert!(store.remove(&name).await.unwrap().is_some());
        assert!(store.get(&name).await.unwrap().is_none());

        let history = store.history(&name).await.unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            [
                HistoryAction::Install,
                HistoryAction::Install,
                HistoryAction::Remove
            ]
        );
        assert_eq!(history[1].version_from.as_deref(), Some("1.0"));
    }
}
