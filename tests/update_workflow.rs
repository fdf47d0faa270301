//! Update workflow tests
//!
//! Drive `UpdateClient` end to end against a mock Central server: check,
//! download, checksum verification, backup and extraction.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cybersensei_http::{HttpClient, HttpConfig};
use cybersensei_updates::{
    installer, UpdateClient, UpdateError, UpdateOutcome, UpdateSettings, UpdateState,
};
use mockito::{Matcher, Server};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

fn package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn sha256(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Every file under `dir`, keyed by relative path
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(relative, std::fs::read(&path).unwrap());
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(dir, dir, &mut files);
    files
}

struct Fixture {
    _root: TempDir,
    install_dir: PathBuf,
    download_dir: PathBuf,
    client: UpdateClient,
}

fn fixture(central_url: String) -> Fixture {
    let root = TempDir::new().unwrap();
    let install_dir = root.path().join("cybersensei");
    let download_dir = root.path().join("downloads");

    std::fs::create_dir_all(install_dir.join("lib")).unwrap();
    std::fs::write(install_dir.join("version.json"), r#"{"version":"1.0.0","changelog":""}"#).unwrap();
    std::fs::write(install_dir.join("lib/app.js"), "console.log('1.0.0')").unwrap();
    std::fs::write(install_dir.join("config.local"), "keep me").unwrap();

    let http = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
    let client = UpdateClient::new(
        http,
        UpdateSettings {
            central_url,
            tenant_id: "550e8400-e29b-41d4-a716-446655440000".into(),
            current_version: "1.0.0".into(),
            install_dir: install_dir.clone(),
            download_dir: download_dir.clone(),
        },
    );

    Fixture {
        _root: root,
        install_dir,
        download_dir,
        client,
    }
}

async fn mock_check(server: &mut Server, checksum: &str) -> mockito::Mock {
    server
        .mock("GET", "/update/check")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "tenantId".into(),
                "550e8400-e29b-41d4-a716-446655440000".into(),
            ),
            Matcher::UrlEncoded("version".into(), "1.0.0".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{
                "available": true,
                "updateId": "a3c1",
                "currentVersion": "1.0.0",
                "latestVersion": "1.1.0",
                "changelog": "- Phishing simulation fixes",
                "fileSize": "1024",
                "checksum": "{checksum}",
                "requiredNodeVersion": null,
                "createdAt": "2026-03-02T09:14:00.000Z",
                "breaking": false,
                "securityUpdate": true
            }}"#
        ))
        .create_async()
        .await
}

#[tokio::test]
async fn test_available_update_is_downloaded_verified_and_extracted() {
    let archive = package(&[
        ("version.json", r#"{"version":"1.1.0","changelog":"- Phishing simulation fixes"}"#),
        ("lib/app.js", "console.log('1.1.0')"),
        ("lib/new.js", "export {}"),
    ]);
    let checksum = sha256(&archive);

    let mut server = Server::new_async().await;
    let check = mock_check(&mut server, &checksum).await;
    let download = server
        .mock("GET", "/update/download/a3c1")
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_header("x-update-version", "1.1.0")
        .with_header("x-checksum", &checksum)
        .with_body(&archive)
        .create_async()
        .await;

    let fx = fixture(server.url());
    let before = snapshot(&fx.install_dir);

    let outcome = fx.client.perform_update_if_available().await.unwrap();

    check.assert_async().await;
    download.assert_async().await;

    let UpdateOutcome::Applied(report) = outcome else {
        panic!("expected the update to be applied");
    };
    assert_eq!(report.manifest.version, "1.1.0");
    assert_eq!(report.files_extracted, 3);
    assert_eq!(fx.client.current_version(), "1.1.0");
    assert_eq!(fx.client.state(), UpdateState::Done);

    assert_eq!(
        std::fs::read_to_string(fx.install_dir.join("lib/app.js")).unwrap(),
        "console.log('1.1.0')"
    );
    assert!(fx.install_dir.join("lib/new.js").exists());
    assert_eq!(
        std::fs::read_to_string(fx.install_dir.join("config.local")).unwrap(),
        "keep me"
    );

    // The backup is a full copy of the pre-update tree
    let backup = report.backup.expect("existing install must be backed up");
    assert_eq!(snapshot(&backup), before);

    let backups = installer::list_backups(&fx.install_dir).await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].path, backup);

    assert!(!fx.download_dir.join("cybersensei-update-1.1.0.zip").exists());
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_install_untouched() {
    let archive = package(&[
        ("version.json", r#"{"version":"1.1.0","changelog":""}"#),
        ("lib/app.js", "tampered"),
    ]);
    let declared = sha256(b"the package Central actually published");

    let mut server = Server::new_async().await;
    let _check = mock_check(&mut server, &declared).await;
    let _download = server
        .mock("GET", "/update/download/a3c1")
        .with_status(200)
        .with_header("x-update-version", "1.1.0")
        .with_header("x-checksum", &declared)
        .with_body(&archive)
        .create_async()
        .await;

    let fx = fixture(server.url());
    let before = snapshot(&fx.install_dir);

    let result = fx.client.perform_update_if_available().await;

    match result {
        Err(UpdateError::ChecksumMismatch { expected, actual }) => {
            assert_eq!(expected, declared);
            assert_eq!(actual, sha256(&archive));
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }

    assert_eq!(snapshot(&fx.install_dir), before);
    assert!(installer::list_backups(&fx.install_dir).await.unwrap().is_empty());
    assert!(!fx.download_dir.join("cybersensei-update-1.1.0.zip").exists());
    assert_eq!(fx.client.current_version(), "1.0.0");
    assert_eq!(fx.client.state(), UpdateState::Failed);
}

#[tokio::test]
async fn test_package_without_manifest_is_rejected_before_backup() {
    let fx = fixture("http://127.0.0.1:9".into());
    let before = snapshot(&fx.install_dir);

    let package_path = fx.download_dir.join("no-manifest.zip");
    std::fs::create_dir_all(&fx.download_dir).unwrap();
    std::fs::write(
        &package_path,
        package(&[("lib/app.js", "console.log('?')"), ("README.md", "no manifest")]),
    )
    .unwrap();

    let result = fx.client.apply_update(&package_path, &fx.install_dir).await;

    assert!(matches!(result, Err(UpdateError::InvalidPackage { .. })));
    assert_eq!(snapshot(&fx.install_dir), before);
    assert!(installer::list_backups(&fx.install_dir).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_restore_brings_back_previous_tree() {
    let archive = package(&[
        ("version.json", r#"{"version":"1.1.0","changelog":""}"#),
        ("lib/app.js", "console.log('1.1.0')"),
    ]);

    let fx = fixture("http://127.0.0.1:9".into());
    let before = snapshot(&fx.install_dir);

    let package_path = fx.download_dir.join("local.zip");
    std::fs::create_dir_all(&fx.download_dir).unwrap();
    std::fs::write(&package_path, &archive).unwrap();

    let report = fx
        .client
        .apply_update(&package_path, &fx.install_dir)
        .await
        .unwrap();
    assert_ne!(snapshot(&fx.install_dir), before);

    installer::restore_backup(&report.backup.unwrap(), &fx.install_dir)
        .await
        .unwrap();
    assert_eq!(snapshot(&fx.install_dir), before);
}

#[tokio::test]
async fn test_unreachable_central_is_network_error() {
    let fx = fixture("http://127.0.0.1:9".into());

    let result = fx.client.perform_update_if_available().await;

    assert!(matches!(result, Err(UpdateError::Network { .. })));
    assert_eq!(fx.client.state(), UpdateState::Failed);
}
