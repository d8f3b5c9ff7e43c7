//! DB Actor - Thread-safe access to SQLite
//!
//! SQLite connections are not `Sync`, so the database lives on a dedicated
//! background thread and async callers talk to it by message passing. The
//! single thread also serialises every write.

use std::path::Path;
use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use cask_schema::{HistoryEvent, InstallRecord, PackageName};
use tokio::sync::oneshot;

use super::db::StateDb;
use super::{RecordStore, StoreError};

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Events that can be sent to the DB actor
enum DbEvent {
    Get {
        name: PackageName,
        resp: Reply<Option<InstallRecord>>,
    },
    Put {
        record: InstallRecord,
        resp: Reply<()>,
    },
    Remove {
        name: PackageName,
        resp: Reply<Option<InstallRecord>>,
    },
    List {
        resp: Reply<Vec<InstallRecord>>,
    },
    History {
        name: PackageName,
        resp: Reply<Vec<HistoryEvent>>,
    },
}

/// A handle to the Database Actor that is Send + Sync and Clone.
///
/// The actor thread exits once every handle has been dropped.
#[derive(Clone, Debug)]
pub struct DbHandle {
    sender: mpsc::Sender<DbEvent>,
}

impl DbHandle {
    /// Spawn an actor over the default state database.
    pub fn spawn() -> Result<Self, StoreError> {
        Self::spawn_with(StateDb::open()?)
    }

    /// Spawn an actor over the database at `path`.
    pub fn spawn_at(path: &Path) -> Result<Self, StoreError> {
        Self::spawn_with(StateDb::open_at(path)?)
    }

    fn spawn_with(db: StateDb) -> Result<Self, StoreError> {
        let (sender, receiver) = mpsc::channel();

        thread::Builder::new()
            .name("cask-db".to_string())
            .spawn(move || run_db_event_loop(db, receiver))?;

        Ok(Self { sender })
    }

    /// Helper to send a request and wait for the response
    async fn request<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(Reply<T>) -> DbEvent,
    {
        let (tx, rx) = oneshot::channel();
        self.sender.send(f(tx)).map_err(|_| StoreError::ActorDied)?;
        rx.await.map_err(|_| StoreError::ActorDied)?
    }
}

#[async_trait]
impl RecordStore for DbHandle {
    async fn get(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError> {
        let name = name.clone();
        self.request(|resp| DbEvent::Get { name, resp }).await
    }

    async fn put(&self, record: &InstallRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.request(|resp| DbEvent::Put { record, resp }).await
    }

    async fn remove(&self, name: &PackageName) -> Result<Option<InstallRecord>, StoreError> {
        let name = name.clone();
        self.request(|resp| DbEvent::Remove { name, resp }).await
    }

    async fn list(&self) -> Result<Vec<InstallRecord>, StoreError> {
        self.request(|resp| DbEvent::List { resp }).await
    }

    async fn history(&self, name: &PackageName) -> Result<Vec<HistoryEvent>, StoreError> {
        let name = name.clone();
        self.request(|resp| DbEvent::History { name, resp }).await
    }
}

/// The actual event loop running in the background thread
fn run_db_event_loop(mut db: StateDb, receiver: mpsc::Receiver<DbEvent>) {
    while let Ok(event) = receiver.recv() {
        match event {
            DbEvent::Get { name, resp } => {
                let _ = resp.send(db.get(name.as_str()));
            }
            DbEvent::Put { record, resp } => {
                let _ = resp.send(db.put(&record));
            }
            DbEvent::Remove { name, resp } => {
                let _ = resp.send(db.remove(name.as_str()));
            }
            DbEvent::List { resp } => {
                let _ = resp.send(db.list());
            }
            DbEvent::History { name, resp } => {
                let _ = resp.send(db.history(name.as_str()));
            }
        }
    }
    tracing::debug!("db actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(name: &str, version: &str) -> InstallRecord {
        InstallRecord {
            package_name: PackageName::new(name),
            installed_version: cask_schema::Version::parse(version),
            installed_path: PathBuf::from(format!("/Applications/{name}.app")),
            source_checksum: None,
            installed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn handle_round_trips_through_actor() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::spawn_at(&dir.path().join("state.db")).unwrap();

        let rec = record("Example", "1.2.0");
        db.put(&rec).await.unwrap();
        assert_eq!(db.get(&rec.package_name).await.unwrap(), Some(rec.clone()));
        assert_eq!(db.list().await.unwrap().len(), 1);

        assert_eq!(db.remove(&rec.package_name).await.unwrap(), Some(rec.clone()));
        assert_eq!(db.history(&rec.package_name).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_for_different_names() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbHandle::spawn_at(&dir.path().join("state.db")).unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                db.put(&record(&format!("App{i:02}"), "1.0")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(db.list().await.unwrap().len(), 16);
    }
}
