//! Error bodies returned by the Central service
//!
//! The Central API answers failures with NestJS-style payloads:
//! `{"statusCode":400,"message":"...","error":"Bad Request"}` where
//! `message` may also be a list of validation messages. Unknown keys are
//! kept in `extra` so nothing the server says is lost.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `message` field of an error body: a single string or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    /// Render as one line
    pub fn joined(&self) -> String {
        match self {
            ErrorMessage::Single(message) => message.clone(),
            ErrorMessage::Many(messages) => messages.join("; "),
        }
    }
}

/// Typed error envelope with an open map for unknown fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ErrorMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorEnvelope {
    /// Parse an error body. Returns `None` for non-JSON or non-object bodies.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body).ok()
    }

    /// Best human-readable message: `message`, then `error`
    pub fn summary(&self) -> Option<String> {
        self.message
            .as_ref()
            .map(ErrorMessage::joined)
            .filter(|m| !m.is_empty())
            .or_else(|| self.error.clone())
    }

    /// Derive the message for a failed response body.
    ///
    /// Falls back to the trimmed raw body, then to the status reason phrase.
    pub fn message_for(status: reqwest::StatusCode, body: &str) -> String {
        if let Some(summary) = Self::parse(body).and_then(|e| e.summary()) {
            return summary;
        }

        let trimmed = body.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }

        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    }
}
