#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cask_cli::ops::{Context, Pipeline};
use cask_core::{FetchConfig, MemoryStore, Reporter};
use cask_schema::{PackageName, Version};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// A zip holding `<app>/Contents/Info.plist` with `payload` as its body.
pub fn app_zip(app: &str, payload: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file(format!("{app}/Contents/Info.plist"), options)
        .unwrap();
    zip.write_all(payload.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn manifest(name: &str, version: &str, url: &str, sha256: &str, app: &str) -> String {
    format!(
        r#"
name = "{name}"
version = "{version}"
url = "{url}"
sha256 = "{sha256}"
homepage = "https://example.test/"
app = "{app}"
"#
    )
}

pub fn fast_fetch() -> FetchConfig {
    FetchConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
        timeout_secs: 10,
        connect_timeout_secs: 5,
        max_redirects: 5,
    }
}

pub fn entries(dir: &Path) -> Vec<String> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Reporter that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub warnings: Mutex<Vec<String>>,
    pub failures: Mutex<Vec<String>>,
    pub done: Mutex<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn section(&self, _: &PackageName, _: &str) {}
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: &PackageName, _: u32, _: Duration, _: &str) {}
    fn done(&self, name: &PackageName, _: &Version, detail: &str) {
        self.done.lock().unwrap().push(format!("{name}: {detail}"));
    }
    fn failed(&self, name: &PackageName, reason: &str) {
        self.failures.lock().unwrap().push(format!("{name}: {reason}"));
    }
    fn info(&self, _: &str) {}
    fn warning(&self, msg: &str) {
        self.warnings.lock().unwrap().push(msg.to_string());
    }
}

/// Isolated applications dir, staging root and in-memory store.
pub struct Harness {
    _root: TempDir,
    pub apps: PathBuf,
    pub staging: PathBuf,
    pub store: Arc<MemoryStore>,
    pub reporter: Arc<RecordingReporter>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let apps = root.path().join("Applications");
        let staging = root.path().join("tmp");
        let store = Arc::new(MemoryStore::new());
        let reporter = Arc::new(RecordingReporter::default());

        let ctx = Context::new(
            &fast_fetch(),
            store.clone(),
            apps.clone(),
            staging.clone(),
            reporter.clone(),
        )
        .unwrap();

        Self {
            _root: root,
            apps,
            staging,
            store,
            reporter,
            pipeline: Pipeline::new(ctx),
        }
    }
}
