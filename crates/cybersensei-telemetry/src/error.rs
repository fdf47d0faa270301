//! Error types for the telemetry crate

use cybersensei_http::HttpError;
use thiserror::Error;

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Why a telemetry push was not accepted. Never retried; the next tick
/// simply sends a fresh sample.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Central service unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Central service rejected the sample
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// 2xx, but not `201 Created`
    #[error("Unexpected status {0}")]
    UnexpectedStatus(u16),

    /// Sample could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client misconfiguration (bad URL, proxy)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for TelemetryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(source) => Self::Network(source.to_string()),
            HttpError::Server { status, message } => Self::Server { status, message },
            HttpError::InvalidUrl(message)
            | HttpError::InvalidProxy(message)
            | HttpError::BuildError(message) => Self::Config(message),
        }
    }
}
