//! Archive unpacking
//!
//! Handles zip, tar, tar.gz, tar.zst, dmg and bare files.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};

use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Container format of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    TarGz,
    TarZst,
    Tar,
    Zip,
    Dmg,
    /// Not an archive; installed as-is.
    Bare,
}

/// Detect archive format from file extension
pub fn detect_format(path: &Path) -> ArtifactFormat {
    let path_str = path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".tar.zst") || path_str.ends_with(".tzst") {
        ArtifactFormat::TarZst
    } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
        ArtifactFormat::TarGz
    } else if path_str.ends_with(".tar") {
        ArtifactFormat::Tar
    } else if path_str.ends_with(".zip") {
        ArtifactFormat::Zip
    } else if path_str.ends_with(".dmg") {
        ArtifactFormat::Dmg
    } else {
        ArtifactFormat::Bare
    }
}

/// Unpack `archive_path` into `dest_dir`, auto-detecting the format.
///
/// Returns the number of entries written.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let format = detect_format(archive_path);
    tracing::debug!(?format, "unpacking {}", archive_path.display());

    match format {
        ArtifactFormat::TarZst => {
            let reader = BufReader::new(File::open(archive_path)?);
            unpack_tar(ZstdDecoder::new(reader)?, dest_dir)
        }
        ArtifactFormat::TarGz => {
            let reader = BufReader::new(File::open(archive_path)?);
            unpack_tar(flate2::read::GzDecoder::new(reader), dest_dir)
        }
        ArtifactFormat::Tar => unpack_tar(BufReader::new(File::open(archive_path)?), dest_dir),
        ArtifactFormat::Zip => unpack_zip(archive_path, dest_dir),
        ArtifactFormat::Dmg => unpack_dmg(archive_path, dest_dir),
        ArtifactFormat::Bare => {
            let filename = archive_path
                .file_name()
                .ok_or_else(|| ExtractError::Archive("Invalid filename".to_string()))?;
            fs::copy(archive_path, dest_dir.join(filename))?;
            Ok(1)
        }
    }
}

/// Reject entry paths that are absolute or climb out of the destination.
fn checked_relative(path: &Path) -> Result<(), ExtractError> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ExtractError::Archive(format!(
            "Invalid path in archive: {}",
            path.display()
        )));
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        checked_relative(&entry_path)?;

        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                entry_path.display()
            )));
        }
        count += 1;
    }

    Ok(count)
}

fn unpack_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let relative_path = file.enclosed_name().ok_or_else(|| {
            ExtractError::Archive(format!("Invalid path in archive: {}", file.name()))
        })?;
        checked_unlinked(dest_dir, &relative_path)?;
        let absolute_path = dest_dir.join(&relative_path);

        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            count += 1;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = file.unix_mode();
            if mode.is_some_and(|m| m & 0o170000 == 0o120000) {
                // bundles ship framework symlinks; the entry body is the link target
                let mut target = String::new();
                file.read_to_string(&mut target)?;
                checked_link(&relative_path, Path::new(&target))?;
                std::os::unix::fs::symlink(&target, &absolute_path)?;
                count += 1;
                continue;
            }

            let mut outfile = File::create(&absolute_path)?;
            io::copy(&mut file, &mut outfile)?;
            if let Some(mode) = mode {
                fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
        #[cfg(not(unix))]
        {
            let mut outfile = File::create(&absolute_path)?;
            io::copy(&mut file, &mut outfile)?;
        }
        count += 1;
    }

    Ok(count)
}

/// Refuse entries whose path, or any parent of it, is a symlink written by an
/// earlier entry. Writing through such a link could land outside `dest_dir`.
fn checked_unlinked(dest_dir: &Path, relative: &Path) -> Result<(), ExtractError> {
    let mut current = dest_dir.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(ExtractError::Archive(format!(
                    "Entry passes through symlink: {}",
                    relative.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// A symlink target must resolve inside the archive root.
#[cfg(unix)]
fn checked_link(link: &Path, target: &Path) -> Result<(), ExtractError> {
    let invalid = || {
        ExtractError::Archive(format!(
            "Symlink escapes archive: {} -> {}",
            link.display(),
            target.display()
        ))
    };
    if target.is_absolute() {
        return Err(invalid());
    }

    let mut depth = link.components().count().saturating_sub(1) as isize;
    for component in target.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
        if depth < 0 {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn unpack_dmg(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let mount = crate::io::dmg::attach(archive_path)
        .map_err(|e| ExtractError::Archive(format!("{e:#}")))?;

    let options = fs_extra::dir::CopyOptions::new().copy_inside(true);
    let mut count = 0;
    for entry in fs::read_dir(&mount.path)? {
        let entry = entry?;
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        // skip the /Applications alias and volume metadata
        if name.to_string_lossy().starts_with('.') || file_type.is_symlink() {
            continue;
        }

        let target = dest_dir.join(&name);
        if file_type.is_dir() {
            fs_extra::dir::copy(entry.path(), &target, &options)
                .map_err(|e| ExtractError::Archive(e.to_string()))?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
        count += 1;
    }

    Ok(count)
}

#[cfg(not(target_os = "macos"))]
fn unpack_dmg(archive_path: &Path, _dest_dir: &Path) -> Result<usize, ExtractError> {
    Err(ExtractError::UnsupportedFormat(format!(
        "{} (disk images require macOS)",
        archive_path.display()
    )))
}
