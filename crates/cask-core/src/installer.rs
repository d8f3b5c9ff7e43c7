//! Places verified artifacts into the applications directory.
//!
//! All filesystem work happens inside a hidden work directory created next to
//! the final location, so every move is a same-volume rename. An existing
//! bundle is moved aside, the new one moved in, and the old one restored if
//! either the swap or the record write fails. Callers therefore observe either
//! the previous install or the new one, never a half-written bundle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cask_schema::{InstallRecord, Manifest, PackageName, Version};
use chrono::Utc;
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;

use crate::io::extract::{self, ExtractError};
use crate::io::verify::VerifiedArtifact;
use crate::store::{PackageLocks, RecordStore, StoreError};

/// Search depth when the install target is not at its declared path.
const LOCATE_MAX_DEPTH: usize = 3;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("{} already exists and is not managed by cask (use --allow-overwrite)", path.display())]
    TargetConflict { path: PathBuf },

    #[error("{target} not found in downloaded artifact")]
    TargetNotFound { target: String },

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Map an IO failure on `path`, surfacing an unwritable location by path.
fn fs_err(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |e| {
        if matches!(
            e.kind(),
            io::ErrorKind::PermissionDenied
                | io::ErrorKind::ReadOnlyFilesystem
                | io::ErrorKind::NotADirectory
        ) {
            InstallError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            InstallError::Io(e)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replace an existing artifact at the target path even if no record claims it.
    pub allow_overwrite: bool,
}

/// Applies verified artifacts and keeps the record store in step.
pub struct Installer {
    store: Arc<dyn RecordStore>,
    locks: PackageLocks,
    applications_dir: PathBuf,
}

impl Installer {
    pub fn new(store: Arc<dyn RecordStore>, applications_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            locks: PackageLocks::new(),
            applications_dir: applications_dir.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn applications_dir(&self) -> &Path {
        &self.applications_dir
    }

    /// Where `manifest`'s bundle ends up.
    pub fn target_path(&self, manifest: &Manifest) -> PathBuf {
        self.applications_dir.join(manifest.bundle_name())
    }

    /// Install `artifact` for `manifest` and record it.
    ///
    /// Holds the package lock for the whole apply and record sequence. The
    /// staged bytes are consumed whether or not the install succeeds.
    ///
    /// # Errors
    ///
    /// - [`InstallError::TargetConflict`] if something not recorded for this
    ///   package occupies the target and `allow_overwrite` is off.
    /// - [`InstallError::PermissionDenied`] if the applications directory is
    ///   not writable or cannot be created.
    /// - [`InstallError::TargetNotFound`] if the artifact does not contain the
    ///   install target.
    pub async fn install(
        &self,
        manifest: &Manifest,
        artifact: VerifiedArtifact,
        options: InstallOptions,
    ) -> Result<InstallRecord, InstallError> {
        let _guard = self.locks.acquire(&manifest.name).await;

        let previous = self.store.get(&manifest.name).await?;
        let target = self.target_path(manifest);

        let managed = previous
            .as_ref()
            .is_some_and(|r| r.installed_path == target);
        if path_exists(&target) && !managed && !options.allow_overwrite {
            return Err(InstallError::TargetConflict { path: target });
        }

        let source_checksum = artifact.verification().digest().map(str::to_string);
        let swap = {
            let apps = self.applications_dir.clone();
            let target = target.clone();
            let install_target = manifest.install_target.clone();
            tokio::task::spawn_blocking(move || {
                let swap = stage_and_swap(&apps, &target, &install_target, artifact.path());
                artifact.discard();
                swap
            })
            .await
            .map_err(io::Error::other)??
        };

        let record = InstallRecord {
            package_name: manifest.name.clone(),
            installed_version: manifest.version.clone(),
            installed_path: target.clone(),
            source_checksum,
            installed_at: Utc::now(),
        };

        if let Err(e) = self.store.put(&record).await {
            tracing::warn!(
                package = %manifest.name,
                error = %e,
                "record write failed, rolling back"
            );
            tokio::task::spawn_blocking(move || swap.rollback())
                .await
                .map_err(io::Error::other)?;
            return Err(e.into());
        }
        swap.commit();

        if let Some(prev) = &previous {
            log_transition(&manifest.name, &prev.installed_version, &manifest.version);
            if prev.installed_path != target && path_exists(&prev.installed_path) {
                tracing::info!(
                    package = %manifest.name,
                    "removing stale artifact {}",
                    prev.installed_path.display()
                );
                if let Err(e) = remove_path(&prev.installed_path) {
                    tracing::warn!(
                        "failed to remove stale artifact {}: {e}",
                        prev.installed_path.display()
                    );
                }
            }
        }

        strip_quarantine(&target);
        tracing::info!(
            package = %manifest.name,
            version = %manifest.version,
            path = %target.display(),
            "installed"
        );
        Ok(record)
    }

    /// Remove the recorded artifact for `name`, then its record.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NotInstalled`] if no record exists, or a
    /// filesystem error if the artifact cannot be deleted (the record is kept).
    pub async fn uninstall(&self, name: &PackageName) -> Result<InstallRecord, InstallError> {
        let _guard = self.locks.acquire(name).await;

        let record = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| InstallError::NotInstalled(name.to_string()))?;

        let path = record.installed_path.clone();
        tokio::task::spawn_blocking(move || {
            if path_exists(&path) {
                remove_path(&path).map_err(fs_err(&path))
            } else {
                tracing::warn!("{} already gone", path.display());
                Ok(())
            }
        })
        .await
        .map_err(io::Error::other)??;

        self.store.remove(name).await?;
        tracing::info!(package = %name, "uninstalled");
        Ok(record)
    }
}

/// Outcome of a successful swap, pending the record write.
struct Swap {
    work: TempDir,
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl Swap {
    /// Keep the new artifact; the work dir (and any backup) is deleted.
    fn commit(self) {
        let path = self.work.path().to_path_buf();
        if let Err(e) = self.work.close() {
            tracing::warn!("failed to remove work dir {}: {e}", path.display());
        }
    }

    /// Put the previous artifact back.
    fn rollback(self) {
        if let Err(e) = remove_path(&self.target) {
            tracing::warn!("failed to remove {}: {e}", self.target.display());
        }
        if let Some(backup) = &self.backup {
            if let Err(e) = fs::rename(backup, &self.target) {
                tracing::error!(
                    "failed to restore {} from {}: {e}",
                    self.target.display(),
                    backup.display()
                );
                // leave the work dir so the backup is recoverable
                let _ = self.work.keep();
            }
        }
    }
}

fn stage_and_swap(
    apps: &Path,
    target: &Path,
    install_target: &Path,
    artifact: &Path,
) -> Result<Swap, InstallError> {
    fs::create_dir_all(apps).map_err(fs_err(apps))?;
    let work = tempfile::Builder::new()
        .prefix(".cask-")
        .tempdir_in(apps)
        .map_err(fs_err(apps))?;

    let unpacked = work.path().join("unpacked");
    let entries = extract::unpack(artifact, &unpacked)?;
    tracing::debug!(entries, "unpacked into {}", unpacked.display());

    let found = locate(&unpacked, install_target).ok_or_else(|| InstallError::TargetNotFound {
        target: install_target.display().to_string(),
    })?;

    let backup = if path_exists(target) {
        let backup = work.path().join("backup");
        fs::rename(target, &backup).map_err(fs_err(target))?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(&found, target) {
        if let Some(backup) = &backup {
            if let Err(restore) = fs::rename(backup, target) {
                tracing::error!("failed to restore {}: {restore}", target.display());
                let _ = work.keep();
            }
        }
        return Err(fs_err(target)(e));
    }

    Ok(Swap {
        work,
        target: target.to_path_buf(),
        backup,
    })
}

/// Find the install target: exact relative path first, then by name.
fn locate(root: &Path, install_target: &Path) -> Option<PathBuf> {
    let exact = root.join(install_target);
    if path_exists(&exact) {
        return Some(exact);
    }

    let wanted = install_target.file_name()?;
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(LOCATE_MAX_DEPTH)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .flatten()
        .filter(|e| e.file_name() == wanted)
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}

/// True for anything at `path`, including dangling symlinks.
fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match path.symlink_metadata() {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn log_transition(name: &PackageName, from: &Version, to: &Version) {
    let parsed = (
        from.as_literal().and_then(|v| semver::Version::parse(v).ok()),
        to.as_literal().and_then(|v| semver::Version::parse(v).ok()),
    );
    match parsed {
        (Some(old), Some(new)) if new > old => {
            tracing::info!(package = %name, %from, %to, "upgrading");
        }
        (Some(old), Some(new)) if new < old => {
            tracing::warn!(package = %name, %from, %to, "downgrading");
        }
        _ => tracing::info!(package = %name, %from, %to, "replacing"),
    }
}

#[cfg(target_os = "macos")]
fn strip_quarantine(path: &Path) {
    let status = std::process::Command::new("xattr")
        .args(["-dr", "com.apple.quarantine"])
        .arg(path)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::debug!("xattr failed on {}: {e}", path.display());
    }
}

#[cfg(not(target_os = "macos"))]
fn strip_quarantine(_path: &Path) {}
