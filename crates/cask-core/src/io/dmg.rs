//! Disk image handling via hdiutil

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// A mounted disk image. Dropping this struct detaches the volume.
#[derive(Debug)]
pub struct MountPoint {
    pub path: PathBuf,
}

impl Drop for MountPoint {
    fn drop(&mut self) {
        if let Err(e) = detach(&self.path) {
            tracing::warn!("{e:#}");
        }
    }
}

/// Attach a disk image read-only and return its mount point.
pub fn attach(dmg_path: &Path) -> Result<MountPoint> {
    let output = Command::new("hdiutil")
        .arg("attach")
        .arg("-nobrowse")
        .arg("-readonly")
        .arg("-noautoopen")
        .arg(dmg_path)
        .output()
        .context("Failed to execute hdiutil")?;

    if !output.status.success() {
        bail!(
            "hdiutil attach failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    mount_point_from(&stdout)
        .map(|path| {
            tracing::debug!("attached {} at {}", dmg_path.display(), path.display());
            MountPoint { path }
        })
        .context("Could not find mount point in hdiutil output")
}

/// Lines look like `/dev/disk4s1<TAB>Apple_HFS<TAB>/Volumes/Example`.
fn mount_point_from(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|line| line.find("/Volumes/").map(|idx| PathBuf::from(line[idx..].trim())))
}

/// Detach a volume, retrying while the resource is busy.
pub fn detach(mount_point: &Path) -> Result<()> {
    for _ in 0..3 {
        let status = Command::new("hdiutil")
            .arg("detach")
            .arg(mount_point)
            .arg("-force")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        if status.is_ok_and(|s| s.success()) {
            return Ok(());
        }
        std::thread::sleep(std::time::Duration::from_millis(500));
    }

    bail!("Failed to detach {}", mount_point.display());
}
