//! Telemetry payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::probe::ResourceSnapshot;

/// Body of `POST /telemetry`. Built fresh for every send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub tenant_id: String,
    #[serde(rename = "uptime")]
    pub uptime_seconds: u64,
    pub active_users: u64,
    pub exercises_completed_today: u64,
    /// Average AI latency in ms since the previous sample
    #[serde(rename = "aiLatency", default, skip_serializing_if = "Option::is_none")]
    pub ai_latency_ms_avg: Option<f64>,
    pub version: String,
    pub additional_data: AdditionalData,
}

/// Free-form `additionalData` object, with the keys the node always fills
/// typed and anything else kept in `extra`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<f64>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub load_average: Vec<f64>,
    #[serde(default)]
    pub agent_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdditionalData {
    pub fn from_snapshot(snapshot: ResourceSnapshot) -> Self {
        Self {
            cpu_usage: snapshot.cpu_usage,
            memory_usage: snapshot.memory_usage,
            disk_usage: snapshot.disk_usage,
            platform: snapshot.platform,
            arch: snapshot.arch,
            hostname: snapshot.hostname,
            load_average: snapshot.load_average,
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Map::new(),
        }
    }
}

/// What `TelemetryClient::status` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryStatus {
    pub is_running: bool,
    pub active_users: u64,
    pub exercises_completed: u64,
    #[serde(rename = "uptime")]
    pub uptime_seconds: u64,
}
