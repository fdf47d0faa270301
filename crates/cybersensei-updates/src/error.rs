//! Error types for the updates crate

use cybersensei_http::HttpError;
use thiserror::Error;

/// Result type alias for update operations
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Every failure of the update workflow. All of them are terminal for the
/// run that produced them.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Central service unreachable, timed out, or the stream broke
    #[error("Network error: {message}")]
    Network { message: String },

    /// Central service answered with a non-2xx status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Downloaded content does not match the declared checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Download carried no checksum to verify against
    #[error("Download did not declare a checksum; refusing unverified package")]
    MissingChecksum,

    /// Archive is unreadable or lacks a valid `version.json`
    #[error("Invalid package: {message}")]
    InvalidPackage { message: String },

    /// Backup or extraction failed
    #[error("Failed to apply update: {message}")]
    ApplyFailure { message: String },

    /// Central service answered 2xx with an unusable body
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// I/O errors outside backup/extraction (temp files, downloads)
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Client misconfiguration (bad URL, proxy)
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl UpdateError {
    /// Create a new invalid package error
    pub fn invalid_package<S: Into<String>>(message: S) -> Self {
        Self::InvalidPackage {
            message: message.into(),
        }
    }

    /// Create a new apply failure
    pub fn apply<S: Into<String>>(message: S) -> Self {
        Self::ApplyFailure {
            message: message.into(),
        }
    }

    /// Create a new malformed response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<HttpError> for UpdateError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(source) => Self::from(source),
            HttpError::Server { status, message } => Self::Server { status, message },
            HttpError::InvalidUrl(message)
            | HttpError::InvalidProxy(message)
            | HttpError::BuildError(message) => Self::Config { message },
        }
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}
