//! Update workflow: check, download, verify, back up, extract
//!
//! Nothing here restarts the service or rolls back automatically. A failed
//! run leaves the state at [`UpdateState::Failed`] and returns the error;
//! the backup taken before extraction stays on disk for a manual
//! [`installer::restore_backup`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cybersensei_http::HttpClientTrait;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::{
    checker::UpdateChecker,
    downloader::PackageDownloader,
    error::Result,
    installer,
    models::{ApplyReport, DownloadedPackage, UpdateCheckResult, UpdateOutcome, UpdateState},
};

/// Where and for whom the client works
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub central_url: String,
    pub tenant_id: String,
    pub current_version: String,
    /// Directory the packages are extracted into
    pub install_dir: PathBuf,
    /// Directory holding downloaded archives until they are applied
    pub download_dir: PathBuf,
}

/// Node-side update client
#[derive(Clone)]
pub struct UpdateClient {
    checker: UpdateChecker,
    downloader: PackageDownloader,
    current_version: Arc<RwLock<String>>,
    state: Arc<RwLock<UpdateState>>,
    install_dir: PathBuf,
    download_dir: PathBuf,
}

impl UpdateClient {
    /// Create a new update client
    pub fn new(http: Arc<dyn HttpClientTrait>, settings: UpdateSettings) -> Self {
        let current_version = Arc::new(RwLock::new(settings.current_version));
        let checker = UpdateChecker::new(
            http.clone(),
            settings.central_url.clone(),
            settings.tenant_id,
            current_version.clone(),
        );
        let downloader = PackageDownloader::new(http, settings.central_url);

        Self {
            checker,
            downloader,
            current_version,
            state: Arc::new(RwLock::new(UpdateState::Idle)),
            install_dir: settings.install_dir,
            download_dir: settings.download_dir,
        }
    }

    /// Current workflow state
    pub fn state(&self) -> UpdateState {
        *self.state.read()
    }

    /// Version reported to Central; bumped after a successful apply
    pub fn current_version(&self) -> String {
        self.current_version.read().clone()
    }

    /// Configured install directory
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Ask Central whether an update is available.
    ///
    /// Leaves the state at `Checking` when one is, so a following download
    /// continues the same run.
    pub async fn check_for_updates(&self) -> Result<UpdateCheckResult> {
        self.set_state(UpdateState::Checking);
        let result = self.tracked(self.checker.check_for_updates().await)?;
        if !result.available {
            self.set_state(UpdateState::UpToDate);
        }
        Ok(result)
    }

    /// Download `update_id` to `destination` and verify its checksum
    pub async fn download_update(
        &self,
        update_id: &str,
        destination: &Path,
    ) -> Result<DownloadedPackage> {
        self.set_state(UpdateState::Downloading);
        let result = self
            .downloader
            .download(update_id, destination, || self.set_state(UpdateState::Verifying))
            .await;
        self.tracked(result)
    }

    /// Back up `install_dir` and extract the package over it.
    ///
    /// The manifest is validated first; an invalid package touches nothing.
    pub async fn apply_update(&self, package_path: &Path, install_dir: &Path) -> Result<ApplyReport> {
        self.set_state(UpdateState::Applying);
        let result = self.apply_inner(package_path, install_dir).await;
        let report = self.tracked(result)?;
        self.set_state(UpdateState::Done);
        Ok(report)
    }

    async fn apply_inner(&self, package_path: &Path, install_dir: &Path) -> Result<ApplyReport> {
        let manifest = installer::read_manifest(package_path).await?;
        info!(
            version = %manifest.version,
            install_dir = %install_dir.display(),
            "Applying update"
        );

        let backup = if tokio::fs::try_exists(install_dir).await? {
            Some(installer::create_backup(install_dir).await?)
        } else {
            info!(install_dir = %install_dir.display(), "Install directory is new, no backup taken");
            None
        };

        let files_extracted = installer::extract_package(package_path, install_dir).await?;

        *self.current_version.write() = manifest.version.clone();

        info!(
            version = %manifest.version,
            files_extracted,
            backup = ?backup,
            "Update applied"
        );
        warn!(version = %manifest.version, "Service restart required to run the new version");

        Ok(ApplyReport {
            manifest,
            install_dir: install_dir.to_path_buf(),
            backup,
            files_extracted,
        })
    }

    /// Run the whole workflow once against the configured directories
    pub async fn perform_update_if_available(&self) -> Result<UpdateOutcome> {
        let check = self.check_for_updates().await?;
        let Some(package) = check.package.clone() else {
            return Ok(UpdateOutcome::UpToDate(check));
        };

        let destination = self
            .download_dir
            .join(format!("cybersensei-update-{}.zip", package.version));
        let downloaded = self.download_update(&package.update_id, &destination).await?;

        if let Some(declared) = &downloaded.version {
            if declared != &package.version {
                warn!(
                    announced = %package.version,
                    declared = %declared,
                    "Download declares a different version than the check"
                );
            }
        }

        let applied = self.apply_update(&downloaded.path, &self.install_dir).await;

        if let Err(e) = tokio::fs::remove_file(&downloaded.path).await {
            warn!(path = %downloaded.path.display(), error = %e, "Failed to remove downloaded archive");
        }

        applied.map(UpdateOutcome::Applied)
    }

    fn set_state(&self, next: UpdateState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            info!(from = %previous, to = %next, "Update state changed");
        }
    }

    fn tracked<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!(error = %e, "Update failed");
            self.set_state(UpdateState::Failed);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{checksum, error::UpdateError};
    use cybersensei_http::{HttpClient, HttpConfig};
    use mockito::Matcher;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn package_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn client(url: String, root: &Path) -> UpdateClient {
        let http = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
        UpdateClient::new(
            http,
            UpdateSettings {
                central_url: url,
                tenant_id: "tenant-1".into(),
                current_version: "1.0.0".into(),
                install_dir: root.join("app"),
                download_dir: root.join("downloads"),
            },
        )
    }

    fn available_body(checksum: &str) -> String {
        format!(
            r#"{{"available":true,"updateId":"u1","currentVersion":"1.0.0","latestVersion":"1.1.0","changelog":"notes","fileSize":1,"checksum":"{checksum}"}}"#
        )
    }

    #[tokio::test]
    async fn test_up_to_date_workflow() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/update/check")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"available":false,"currentVersion":"1.0.0","message":"Node is up to date"}"#)
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let client = client(server.url(), root.path());
        let outcome = client.perform_update_if_available().await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::UpToDate(_)));
        assert_eq!(client.state(), UpdateState::UpToDate);
        assert_eq!(client.current_version(), "1.0.0");
    }

    #[tokio::test]
    async fn test_full_workflow_applies_and_cleans_up() {
        let package = package_bytes(&[
            ("version.json", r#"{"version":"1.1.0","changelog":"notes"}"#),
            ("bin/app.txt", "v1.1.0"),
        ]);
        let checksum = checksum::bytes_checksum(&package);

        let mut server = mockito::Server::new_async().await;
        let _check = server
            .mock("GET", "/update/check")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(available_body(&checksum))
            .create_async()
            .await;
        let _download = server
            .mock("GET", "/update/download/u1")
            .with_status(200)
            .with_header("x-update-version", "1.1.0")
            .with_header("x-checksum", &checksum)
            .with_body(&package)
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let client = client(server.url(), root.path());
        std::fs::create_dir_all(root.path().join("app/bin")).unwrap();
        std::fs::write(root.path().join("app/bin/app.txt"), "v1.0.0").unwrap();

        let outcome = client.perform_update_if_available().await.unwrap();
        let UpdateOutcome::Applied(report) = outcome else {
            panic!("expected an applied update");
        };

        assert_eq!(report.manifest.version, "1.1.0");
        assert_eq!(client.state(), UpdateState::Done);
        assert_eq!(client.current_version(), "1.1.0");
        assert_eq!(
            std::fs::read_to_string(root.path().join("app/bin/app.txt")).unwrap(),
            "v1.1.0"
        );

        let backup = report.backup.unwrap();
        assert_eq!(
            std::fs::read_to_string(backup.join("bin/app.txt")).unwrap(),
            "v1.0.0"
        );
        assert!(!root
            .path()
            .join("downloads/cybersensei-update-1.1.0.zip")
            .exists());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_without_touching_install() {
        let package = package_bytes(&[("version.json", r#"{"version":"1.1.0","changelog":"x"}"#)]);

        let mut server = mockito::Server::new_async().await;
        let _check = server
            .mock("GET", "/update/check")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(available_body("sha256:0000"))
            .create_async()
            .await;
        let _download = server
            .mock("GET", "/update/download/u1")
            .with_status(200)
            .with_header("x-checksum", "sha256:0000")
            .with_body(&package)
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let client = client(server.url(), root.path());
        std::fs::create_dir_all(root.path().join("app")).unwrap();
        std::fs::write(root.path().join("app/app.txt"), "v1.0.0").unwrap();

        let result = client.perform_update_if_available().await;

        assert!(matches!(result, Err(UpdateError::ChecksumMismatch { .. })));
        assert_eq!(client.state(), UpdateState::Failed);
        assert_eq!(client.current_version(), "1.0.0");
        assert!(installer::list_backups(&root.path().join("app"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_apply_new_install_dir_takes_no_backup() {
        let root = tempfile::tempdir().unwrap();
        let package_path = root.path().join("local.zip");
        std::fs::write(
            &package_path,
            package_bytes(&[
                ("version.json", r#"{"version":"2.0.0","changelog":"major"}"#),
                ("README", "hi"),
            ]),
        )
        .unwrap();

        let client = client("http://127.0.0.1:9".into(), root.path());
        let install_dir = root.path().join("fresh");
        let report = client.apply_update(&package_path, &install_dir).await.unwrap();

        assert!(report.backup.is_none());
        assert_eq!(report.files_extracted, 2);
        assert_eq!(client.current_version(), "2.0.0");
        assert!(install_dir.join("README").exists());
    }

    #[tokio::test]
    async fn test_invalid_package_leaves_state_failed() {
        let root = tempfile::tempdir().unwrap();
        let package_path = root.path().join("broken.zip");
        std::fs::write(&package_path, package_bytes(&[("app.txt", "no manifest")])).unwrap();

        let client = client("http://127.0.0.1:9".into(), root.path());
        let install_dir = root.path().join("app");
        std::fs::create_dir_all(&install_dir).unwrap();

        let result = client.apply_update(&package_path, &install_dir).await;

        assert!(matches!(result, Err(UpdateError::InvalidPackage { .. })));
        assert_eq!(client.state(), UpdateState::Failed);
        assert!(!install_dir.join("app.txt").exists());
        assert!(installer::list_backups(&install_dir).await.unwrap().is_empty());
    }
}
