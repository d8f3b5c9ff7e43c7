//! SQLite state database
//!
//! Tracks the current install record of each package and an append-only
//! history of changes.

use std::path::{Path, PathBuf};

use cask_schema::{HistoryAction, HistoryEvent, InstallRecord, PackageName, Version};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::StoreError;
use crate::db_path;

/// Row as stored, before timestamp and path decoding.
struct InstallRow {
    name: String,
    version: String,
    path: String,
    checksum: Option<String>,
    installed_at: String,
}

impl InstallRow {
    fn into_record(self) -> Result<InstallRecord, StoreError> {
        let installed_at = parse_timestamp(&self.name, &self.installed_at)?;
        Ok(InstallRecord {
            package_name: PackageName::new(self.name),
            installed_version: Version::parse(&self.version),
            installed_path: PathBuf::from(self.path),
            source_checksum: self.checksum,
            installed_at,
        })
    }
}

const INSTALL_COLUMNS: &str = "name, version, path, checksum, installed_at";

fn read_install_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstallRow> {
    Ok(InstallRow {
        name: row.get(0)?,
        version: row.get(1)?,
        path: row.get(2)?,
        checksum: row.get(3)?,
        installed_at: row.get(4)?,
    })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            name: name.to_string(),
            message: format!("bad timestamp '{raw}': {e}"),
        })
}

/// State database for tracking installations
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Open or create the state database under the cask home.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&db_path())
    }

    /// Open database at a specific path
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS installs (
                name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                path TEXT NOT NULL,
                checksum TEXT,
                installed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                package TEXT NOT NULL,
                version_from TEXT,
                version_to TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_history_package ON history(package);
            ",
        )?;
        Ok(())
    }

    /// Get the record for a package
    pub fn get(&self, name: &str) -> Result<Option<InstallRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {INSTALL_COLUMNS} FROM installs WHERE name = ?1"),
                params![name],
                read_install_row,
            )
            .optional()?;
        row.map(InstallRow::into_record).transpose()
    }

    /// Record an installation, replacing any previous record for the name.
    pub fn put(&mut self, record: &InstallRecord) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT version FROM installs WHERE name = ?1",
                params![record.package_name.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO installs ({INSTALL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                record.package_name.as_str(),
                record.installed_version.to_string(),
                record.installed_path.to_string_lossy(),
                record.source_checksum,
                format_timestamp(&record.installed_at),
            ],
        )?;
        add_history(
            &tx,
            &record.installed_at,
            HistoryAction::Install,
            record.package_name.as_str(),
            previous.as_deref(),
            Some(&record.installed_version.to_string()),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove a package record
    pub fn remove(&mut self, name: &str) -> Result<Option<InstallRecord>, StoreError> {
        let tx = self.conn.transaction()?;
        let row = tx
            .query_row(
                &format!("SELECT {INSTALL_COLUMNS} FROM installs WHERE name = ?1"),
                params![name],
                read_install_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        tx.execute("DELETE FROM installs WHERE name = ?1", params![name])?;
        add_history(
            &tx,
            &Utc::now(),
            HistoryAction::Remove,
            name,
            Some(&row.version),
            None,
        )?;
        tx.commit()?;
        row.into_record().map(Some)
    }

    /// List all records
    pub fn list(&self) -> Result<Vec<InstallRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {INSTALL_COLUMNS} FROM installs ORDER BY name"))?;
        let rows = stmt
            .query_map([], read_install_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(InstallRow::into_record).collect()
    }

    /// History of a package, oldest first
    pub fn history(&self, name: &str) -> Result<Vec<HistoryEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, action, package, version_from, version_to
             FROM history WHERE package = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(timestamp, action, package, version_from, version_to)| {
                let action = HistoryAction::parse(&action).ok_or_else(|| StoreError::Corrupt {
                    name: package.clone(),
                    message: format!("unknown history action '{action}'"),
                })?;
                Ok(HistoryEvent {
                    timestamp: parse_timestamp(&package, &timestamp)?,
                    action,
                    package: PackageName::new(package),
                    version_from,
                    version_to,
                })
            })
            .collect()
    }
}

fn add_history(
    tx: &Transaction<'_>,
    timestamp: &DateTime<Utc>,
    action: HistoryAction,
    package: &str,
    version_from: Option<&str>,
    version_to: Option<&str>,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO history (timestamp, action, package, version_from, version_to)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            format_timestamp(timestamp),
            action.as_str(),
            package,
            version_from,
            version_to
        ],
    )?;
    Ok(())
}
