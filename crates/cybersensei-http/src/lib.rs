//! HTTP plumbing shared by the CyberSensei node agents
//!
//! Wraps `reqwest` behind a small mockable trait and normalises every
//! failure into one of two shapes: the Central service was unreachable
//! ([`HttpError::Network`]) or it answered with a non-2xx status
//! ([`HttpError::Server`]). Requests are never retried; callers decide what
//! a failure means for their workflow.
//!
//! ## Features
//!
//! - **Trait-based design**: Mockable via `HttpClientTrait`
//! - **Bounded timeouts**: Separate limits for API calls and package downloads
//! - **Typed error bodies**: `ErrorEnvelope` parses NestJS-style error payloads

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;

pub use client::{join_url, shared_client, HttpClient, HttpClientTrait};
pub use config::HttpConfig;
pub use envelope::{ErrorEnvelope, ErrorMessage};
pub use error::{HttpError, Result};

/// Re-export commonly used types
pub use reqwest::{header, Response, StatusCode};
