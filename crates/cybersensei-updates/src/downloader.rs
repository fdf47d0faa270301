//! Package download with checksum verification
//!
//! The body is streamed to disk first, then hashed from disk. A package is
//! only handed back when its SHA-256 matches the checksum Central declared
//! alongside the stream; on any failure the file at the destination is
//! removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cybersensei_http::{header, join_url, HttpClientTrait, Response};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::{
    checksum,
    error::{Result, UpdateError},
    models::{DownloadedPackage, CHECKSUM_HEADER, VERSION_HEADER},
};

/// Fetches update packages from Central
#[derive(Clone)]
pub struct PackageDownloader {
    http: Arc<dyn HttpClientTrait>,
    central_url: String,
}

impl PackageDownloader {
    /// Create a new downloader
    pub fn new(http: Arc<dyn HttpClientTrait>, central_url: impl Into<String>) -> Self {
        Self {
            http,
            central_url: central_url.into(),
        }
    }

    /// `GET /update/download/{update_id}` into `destination`, then verify.
    ///
    /// `on_streamed` runs once the body is on disk, before hashing.
    pub async fn download(
        &self,
        update_id: &str,
        destination: &Path,
        on_streamed: impl FnOnce(),
    ) -> Result<DownloadedPackage> {
        let url = join_url(&self.central_url, &format!("/update/download/{update_id}"));
        info!(update_id, destination = %destination.display(), "Downloading update");

        let response = self.http.download(&url).await?;

        let version = header_value(&response, VERSION_HEADER);
        let expected = header_value(&response, CHECKSUM_HEADER);
        let content_length = response.content_length().or_else(|| {
            header_value(&response, header::CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok())
        });

        info!(
            version = ?version,
            size_bytes = ?content_length,
            "Download started"
        );

        let bytes_written = match stream_to_file(response, destination).await {
            Ok(written) => written,
            Err(e) => {
                remove_quietly(destination).await;
                return Err(e);
            }
        };

        info!(bytes_written, path = %destination.display(), "Download complete");
        on_streamed();

        let Some(expected) = expected else {
            error!("Download carried no checksum header, discarding package");
            remove_quietly(destination).await;
            return Err(UpdateError::MissingChecksum);
        };

        let actual = match checksum::file_checksum(destination).await {
            Ok(actual) => actual,
            Err(e) => {
                remove_quietly(destination).await;
                return Err(e);
            }
        };

        if !checksum::matches(&expected, &actual) {
            error!(expected = %expected, actual = %actual, "Checksum mismatch, deleting package");
            remove_quietly(destination).await;
            return Err(UpdateError::ChecksumMismatch { expected, actual });
        }

        info!(checksum = %actual, "Checksum verified");

        Ok(DownloadedPackage {
            path: PathBuf::from(destination),
            version,
            checksum: actual,
            content_length,
            bytes_written,
        })
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn stream_to_file(mut response: Response, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = File::create(destination).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        debug!(written, "Chunk written");
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove downloaded file");
        }
    }
}
