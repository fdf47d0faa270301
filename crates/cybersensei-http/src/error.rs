//! HTTP client error types

use thiserror::Error;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Remote unreachable, timed out, or the body stream broke
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote answered with a non-2xx status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy configuration
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// Client build error
    #[error("Failed to build HTTP client: {0}")]
    BuildError(String),
}

impl HttpError {
    /// Create a server error from a status and message
    pub fn server<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Status code of a server error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote could not be reached at all
    pub fn is_network(&self) -> bool {
        matches!(self, HttpError::Network(_))
    }
}
