//! Node configuration
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file
//! (`--config`, else `<config dir>/cybersensei/node.toml`), then
//! `CYBERSENSEI_*` environment variables such as `CYBERSENSEI_CENTRAL_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use cybersensei_http::HttpConfig;
use cybersensei_telemetry::TelemetrySettings;
use cybersensei_updates::UpdateSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the environment variables read by [`NodeConfig::load`]
pub const ENV_PREFIX: &str = "CYBERSENSEI";

/// Longest accepted telemetry interval: one week
pub const MAX_TELEMETRY_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Configuration result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Everything the node agent needs to talk to Central
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub central_url: String,
    pub tenant_id: String,
    /// Version this node currently runs
    pub current_version: String,
    pub install_dir: PathBuf,
    /// Where downloaded packages wait until they are applied
    pub download_dir: PathBuf,
    pub telemetry_interval_minutes: u64,
    pub request_timeout_secs: u64,
    pub telemetry_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            central_url: String::new(),
            tenant_id: String::new(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            install_dir: PathBuf::from("/opt/cybersensei"),
            download_dir: std::env::temp_dir(),
            telemetry_interval_minutes: 5,
            request_timeout_secs: 30,
            telemetry_timeout_secs: 10,
            download_timeout_secs: 600,
        }
    }
}

impl NodeConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cybersensei")
            .join("node.toml")
    }

    /// Load from file and environment. An explicit `path` must exist; the
    /// default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`NodeConfig::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Reject settings that cannot work against Central
    pub fn validate(&self) -> Result<()> {
        if self.central_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "central_url must be set".to_string(),
            ));
        }
        url::Url::parse(&self.central_url).map_err(|e| {
            ConfigError::Validation(format!("central_url {:?} is invalid: {e}", self.central_url))
        })?;
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::Validation("tenant_id must be set".to_string()));
        }
        semver::Version::parse(&self.current_version).map_err(|e| {
            ConfigError::Validation(format!(
                "current_version {:?} is not semver: {e}",
                self.current_version
            ))
        })?;
        telemetry_interval_from_minutes(self.telemetry_interval_minutes)
            .map_err(|e| ConfigError::Validation(format!("telemetry_interval_minutes {e}")))?;
        Ok(())
    }

    /// HTTP settings for update checks and downloads
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default()
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_download_timeout(Duration::from_secs(self.download_timeout_secs))
    }

    /// HTTP settings for telemetry pushes
    pub fn telemetry_http_config(&self) -> HttpConfig {
        HttpConfig::telemetry().with_timeout(Duration::from_secs(self.telemetry_timeout_secs))
    }

    /// Expects a validated config; out-of-range values saturate
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_minutes.saturating_mul(60))
    }

    pub fn update_settings(&self) -> UpdateSettings {
        UpdateSettings {
            central_url: self.central_url.clone(),
            tenant_id: self.tenant_id.clone(),
            current_version: self.current_version.clone(),
            install_dir: self.install_dir.clone(),
            download_dir: self.download_dir.clone(),
        }
    }

    pub fn telemetry_settings(&self) -> TelemetrySettings {
        TelemetrySettings {
            central_url: self.central_url.clone(),
            tenant_id: self.tenant_id.clone(),
            version: self.current_version.clone(),
        }
    }
}

/// Convert a telemetry interval in minutes, rejecting zero and anything
/// beyond [`MAX_TELEMETRY_INTERVAL_MINUTES`]
pub fn telemetry_interval_from_minutes(minutes: u64) -> std::result::Result<Duration, String> {
    match minutes {
        0 => Err("must be greater than 0".to_string()),
        m if m > MAX_TELEMETRY_INTERVAL_MINUTES => Err(format!(
            "must be at most {MAX_TELEMETRY_INTERVAL_MINUTES} (one week), got {m}"
        )),
        m => Ok(Duration::from_secs(m * 60)),
    }
}
