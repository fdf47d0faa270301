//! Core data models for the updates system

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, UpdateError};

/// Name of the manifest entry every package carries at its root
pub const MANIFEST_ENTRY: &str = "version.json";

/// Header carrying the package version on downloads
pub const VERSION_HEADER: &str = "x-update-version";

/// Header carrying the `sha256:<hex>` checksum on downloads
pub const CHECKSUM_HEADER: &str = "x-checksum";

/// Raw body of `GET /update/check`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResponse {
    pub available: bool,
    #[serde(default)]
    pub update_id: Option<String>,
    pub current_version: String,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    /// Central stores sizes as bigint, which reaches the wire as a string
    #[serde(default, deserialize_with = "number_or_string")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub breaking: Option<bool>,
    #[serde(default)]
    pub security_update: Option<bool>,
    #[serde(default, alias = "requiredNodeVersion")]
    pub required_runtime_version: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid size {text:?}"))),
    }
}

/// A published update package. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePackage {
    pub update_id: String,
    pub version: String,
    pub changelog: String,
    pub file_size: u64,
    /// `sha256:<hex>`
    pub checksum: String,
    pub breaking: bool,
    pub security_update: bool,
    pub required_runtime_version: Option<String>,
}

/// Outcome of an update check. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResult {
    pub available: bool,
    pub current_version: String,
    pub latest_version: Option<String>,
    pub message: Option<String>,
    /// Present iff `available`
    pub package: Option<UpdatePackage>,
}

impl UpdateCheckResult {
    /// Build a result from the wire body, rejecting an `available` answer
    /// that lacks what the download step needs.
    pub fn from_response(response: UpdateCheckResponse) -> Result<Self> {
        if !response.available {
            return Ok(Self {
                available: false,
                current_version: response.current_version,
                latest_version: response.latest_version,
                message: response.message,
                package: None,
            });
        }

        let update_id = response
            .update_id
            .ok_or_else(|| UpdateError::malformed("update available but no updateId"))?;
        let checksum = response
            .checksum
            .ok_or_else(|| UpdateError::malformed("update available but no checksum"))?;
        let version = response
            .latest_version
            .clone()
            .ok_or_else(|| UpdateError::malformed("update available but no latestVersion"))?;

        let package = UpdatePackage {
            update_id,
            version,
            changelog: response.changelog.unwrap_or_default(),
            file_size: response.file_size.unwrap_or(0),
            checksum,
            breaking: response.breaking.unwrap_or(false),
            security_update: response.security_update.unwrap_or(false),
            required_runtime_version: response.required_runtime_version,
        };

        Ok(Self {
            available: true,
            current_version: response.current_version,
            latest_version: response.latest_version,
            message: response.message,
            package: Some(package),
        })
    }
}

/// A verified package on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPackage {
    pub path: PathBuf,
    /// Version declared by the download metadata, if any
    pub version: Option<String>,
    /// Verified `sha256:<hex>` checksum
    pub checksum: String,
    /// Declared content length, if any
    pub content_length: Option<u64>,
    pub bytes_written: u64,
}

/// `version.json` inside a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub version: String,
    pub changelog: String,
    #[serde(default, alias = "requiredRuntimeVersion")]
    pub required_node_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub security_update: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What `apply_update` did
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub manifest: PackageManifest,
    pub install_dir: PathBuf,
    /// Backup taken before extraction; `None` when the install dir was new
    pub backup: Option<PathBuf>,
    pub files_extracted: usize,
}

/// Result of the full check-download-apply workflow
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing to install
    UpToDate(UpdateCheckResult),
    /// A package was verified and applied; a restart is still required
    Applied(ApplyReport),
}

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Idle,
    Checking,
    UpToDate,
    Downloading,
    Verifying,
    Applying,
    Done,
    Failed,
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UpdateState::Idle => "idle",
            UpdateState::Checking => "checking",
            UpdateState::UpToDate => "up_to_date",
            UpdateState::Downloading => "downloading",
            UpdateState::Verifying => "verifying",
            UpdateState::Applying => "applying",
            UpdateState::Done => "done",
            UpdateState::Failed => "failed",
        };
        f.write_str(name)
    }
}
