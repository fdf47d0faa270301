//! Package installation: manifest validation, backups, extraction, restore
//!
//! Backups are sibling directories of the install dir named
//! `{install_dir}_backup_{timestamp}`, where the timestamp is RFC 3339 UTC
//! with millisecond precision and `:`/`.` replaced by `-`. They are full
//! recursive copies and are never deleted here; retention belongs to the
//! operator.

use std::future::Future;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tokio::fs;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::{Result, UpdateError};
use crate::models::{PackageManifest, MANIFEST_ENTRY};

const BACKUP_MARKER: &str = "_backup_";
const BACKUP_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// A backup directory found next to an install dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    /// Parsed from the directory name
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Read and validate `version.json` from a package without extracting it
pub async fn read_manifest(package_path: &Path) -> Result<PackageManifest> {
    let package_path = package_path.to_path_buf();
    tokio::task::spawn_blocking(move || read_manifest_blocking(&package_path))
        .await
        .map_err(|e| UpdateError::invalid_package(format!("manifest reader panicked: {e}")))?
}

fn read_manifest_blocking(package_path: &Path) -> Result<PackageManifest> {
    let file = std::fs::File::open(package_path).map_err(|e| {
        UpdateError::invalid_package(format!("cannot open {}: {e}", package_path.display()))
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| UpdateError::invalid_package(format!("not a zip archive: {e}")))?;

    let mut entry = archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| UpdateError::invalid_package(format!("{MANIFEST_ENTRY} not found in package")))?;

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| UpdateError::invalid_package(format!("unreadable {MANIFEST_ENTRY}: {e}")))?;

    let manifest: PackageManifest = serde_json::from_str(&content)
        .map_err(|e| UpdateError::invalid_package(format!("invalid {MANIFEST_ENTRY}: {e}")))?;

    semver::Version::parse(&manifest.version).map_err(|e| {
        UpdateError::invalid_package(format!(
            "version {:?} is not semver: {e}",
            manifest.version
        ))
    })?;

    Ok(manifest)
}

/// Backup path for `install_dir` at a given instant
pub fn backup_path_for(install_dir: &Path, at: DateTime<Utc>) -> PathBuf {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");

    // Collecting components drops any trailing separator.
    let base: PathBuf = install_dir.components().collect();
    let mut name = base.into_os_string();
    name.push(format!("{BACKUP_MARKER}{stamp}"));
    PathBuf::from(name)
}

/// Copy `install_dir` to a fresh timestamped backup and return its path
pub async fn create_backup(install_dir: &Path) -> Result<PathBuf> {
    let backup_path = backup_path_for(install_dir, Utc::now());

    if fs::try_exists(&backup_path).await.unwrap_or(false) {
        return Err(UpdateError::apply(format!(
            "backup path {} already exists",
            backup_path.display()
        )));
    }

    info!(backup = %backup_path.display(), "Creating backup");

    if let Err(e) = copy_dir_recursive(install_dir.to_path_buf(), backup_path.clone()).await {
        if let Err(cleanup) = fs::remove_dir_all(&backup_path).await {
            warn!(backup = %backup_path.display(), error = %cleanup, "Failed to remove partial backup");
        }
        return Err(UpdateError::apply(format!(
            "backup of {} failed: {e}",
            install_dir.display()
        )));
    }

    info!(backup = %backup_path.display(), "Backup created");
    Ok(backup_path)
}

/// Extract every entry of `package_path` into `install_dir`, overwriting
/// existing files. Returns the number of files written.
///
/// Entry names are all checked before anything is written, so an archive
/// with a path escaping `install_dir` leaves the directory untouched.
pub async fn extract_package(package_path: &Path, install_dir: &Path) -> Result<usize> {
    let package_path = package_path.to_path_buf();
    let install_dir = install_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&package_path, &install_dir))
        .await
        .map_err(|e| UpdateError::apply(format!("extraction task panicked: {e}")))?
}

fn extract_blocking(package_path: &Path, install_dir: &Path) -> Result<usize> {
    let file = std::fs::File::open(package_path)
        .map_err(|e| UpdateError::apply(format!("cannot open {}: {e}", package_path.display())))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| UpdateError::apply(format!("not a zip archive: {e}")))?;

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::apply(format!("corrupt entry #{index}: {e}")))?;
        if entry.enclosed_name().is_none() {
            return Err(UpdateError::apply(format!(
                "entry {:?} escapes the install directory",
                entry.name()
            )));
        }
    }

    std::fs::create_dir_all(install_dir)
        .map_err(|e| UpdateError::apply(format!("cannot create {}: {e}", install_dir.display())))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::apply(format!("corrupt entry #{index}: {e}")))?;
        let out_path = match entry.enclosed_name() {
            Some(relative) => install_dir.join(relative),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| write_error(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        let mut out = std::fs::File::create(&out_path).map_err(|e| write_error(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| write_error(&out_path, e))?;

        // Keep launcher scripts executable.
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode().filter(|mode| mode & 0o111 != 0) {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode | 0o200))
                .map_err(|e| write_error(&out_path, e))?;
        }

        written += 1;
    }

    Ok(written)
}

fn write_error(path: &Path, e: std::io::Error) -> UpdateError {
    UpdateError::apply(format!("cannot write {}: {e}", path.display()))
}

/// List backups of `install_dir`, newest first
pub async fn list_backups(install_dir: &Path) -> Result<Vec<BackupInfo>> {
    let base: PathBuf = install_dir.components().collect();
    let (parent, name) = match (base.parent(), base.file_name()) {
        (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_string_lossy().to_string()),
        _ => return Ok(vec![]),
    };
    let parent = if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        parent
    };
    let prefix = format!("{name}{BACKUP_MARKER}");

    if !fs::try_exists(&parent).await.unwrap_or(false) {
        return Ok(vec![]);
    }

    let mut backups = vec![];
    let mut entries = fs::read_dir(&parent).await?;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(stamp) = file_name.strip_prefix(&prefix) else {
            continue;
        };
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let created_at = NaiveDateTime::parse_from_str(stamp, BACKUP_STAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc());
        let size_bytes = directory_size(entry.path()).await?;

        backups.push(BackupInfo {
            path: entry.path(),
            created_at,
            size_bytes,
        });
    }

    // Stamps sort lexicographically in time order.
    backups.sort_by(|a, b| b.path.cmp(&a.path));

    Ok(backups)
}

/// Replace the contents of `install_dir` with a backup.
///
/// Operator action only; the update workflow never calls this.
pub async fn restore_backup(backup_path: &Path, install_dir: &Path) -> Result<()> {
    let is_dir = fs::metadata(backup_path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(UpdateError::apply(format!(
            "backup {} does not exist",
            backup_path.display()
        )));
    }

    info!(backup = %backup_path.display(), install_dir = %install_dir.display(), "Restoring backup");

    if fs::try_exists(install_dir).await.unwrap_or(false) {
        clear_directory(install_dir)
            .await
            .map_err(|e| UpdateError::apply(format!("cannot clear {}: {e}", install_dir.display())))?;
    }

    copy_dir_recursive(backup_path.to_path_buf(), install_dir.to_path_buf())
        .await
        .map_err(|e| UpdateError::apply(format!("restore failed: {e}")))?;

    info!("Backup restored");
    Ok(())
}

async fn clear_directory(dir: &Path) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// Copy the contents of `from` into `to`. Symbolic links below `from` are
/// recreated as links and never followed.
fn copy_dir_recursive(
    from: PathBuf,
    to: PathBuf,
) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> {
    Box::pin(async move {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let source = entry.path();
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await?;

            if file_type.is_symlink() {
                copy_symlink(&source, &target).await?;
            } else if file_type.is_dir() {
                copy_dir_recursive(source, target).await?;
            } else {
                fs::copy(&source, &target).await?;
            }
        }
        Ok(())
    })
}

#[cfg(unix)]
async fn copy_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    let link = fs::read_link(source).await?;
    fs::symlink(link, target).await
}

#[cfg(not(unix))]
async fn copy_symlink(source: &Path, _target: &Path) -> std::io::Result<()> {
    warn!(path = %source.display(), "Skipping symbolic link");
    Ok(())
}

fn directory_size(path: PathBuf) -> Pin<Box<dyn Future<Output = std::io::Result<u64>> + Send>> {
    Box::pin(async move {
        let mut size = 0u64;
        let mut entries = fs::read_dir(&path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = fs::symlink_metadata(entry.path()).await?;
            if metadata.is_dir() {
                size += directory_size(entry.path()).await?;
            } else {
                size += metadata.len();
            }
        }

        Ok(size)
    })
}
