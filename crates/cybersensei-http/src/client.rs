//! HTTP client implementation

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use crate::{
    config::HttpConfig,
    envelope::ErrorEnvelope,
    error::{HttpError, Result},
};

/// Mockable HTTP client trait
///
/// Every method resolves to the response only for 2xx statuses; anything
/// else becomes [`HttpError::Server`] with the message from the body.
#[async_trait]
pub trait HttpClientTrait: Send + Sync {
    /// Execute a GET request with query parameters
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response>;

    /// Execute a GET request for a large body, under the download timeout
    async fn download(&self, url: &str) -> Result<Response>;

    /// Execute a POST request with a JSON body
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Response>;
}

/// Production HTTP client
pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with configuration
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(if config.max_redirects > 0 {
                reqwest::redirect::Policy::limited(config.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            });

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        if config.pool_enabled {
            builder = builder.pool_idle_timeout(config.pool_idle_timeout);
        } else {
            builder = builder.pool_max_idle_per_host(0);
        }

        let inner = builder
            .build()
            .map_err(|e| HttpError::BuildError(e.to_string()))?;

        Ok(Self { inner, config })
    }

    /// Create HTTP client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpConfig::default())
    }

    /// Get configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let url = url
            .parse::<url::Url>()
            .map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        Ok(self.inner.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response> {
        debug!(url, "HTTP GET");
        let request = self.request(Method::GET, url)?.query(query);
        self.send(request).await
    }

    async fn download(&self, url: &str) -> Result<Response> {
        debug!(url, timeout = ?self.config.download_timeout, "HTTP GET (download)");
        let request = self
            .request(Method::GET, url)?
            .timeout(self.config.download_timeout);
        self.send(request).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
        debug!(url, "HTTP POST");
        let request = self.request(Method::POST, url)?.json(body);
        self.send(request).await
    }
}

/// Turn a non-2xx response into [`HttpError::Server`]
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(HttpError::server(
        status.as_u16(),
        ErrorEnvelope::message_for(status, &body),
    ))
}

/// Join a base URL and an absolute path, tolerating a trailing slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Create a shared HTTP client (Arc-wrapped for cloning)
pub fn shared_client(config: HttpConfig) -> Result<Arc<dyn HttpClientTrait>> {
    Ok(Arc::new(HttpClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_creation_with_defaults() {
        let client = HttpClient::with_defaults();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_creation_with_config() {
        let config = HttpConfig {
            timeout: Duration::from_secs(10),
            ..Default::default()
        };

        let client = HttpClient::new(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_proxy() {
        let config = HttpConfig::default().with_proxy("http://[::1");

        let result = HttpClient::new(config);
        assert!(matches!(result, Err(HttpError::InvalidProxy(_))));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://central:3000/", "/update/check"),
            "http://central:3000/update/check"
        );
        assert_eq!(
            join_url("http://central:3000", "telemetry"),
            "http://central:3000/telemetry"
        );
    }

    #[tokio::test]
    async fn test_get_invalid_url() {
        let client = HttpClient::with_defaults().unwrap();
        let result = client.get("not a url", &[]).await;
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_get_sends_query_and_returns_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/update/check")
            .match_query(mockito::Matcher::UrlEncoded(
                "version".into(),
                "1.0.0".into(),
            ))
            .with_status(200)
            .with_body(r#"{"available":false}"#)
            .create_async()
            .await;

        let client = HttpClient::with_defaults().unwrap();
        let url = join_url(&server.url(), "/update/check");
        let response = client.get(&url, &[("version", "1.0.0")]).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_becomes_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/telemetry")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode":400,"message":["uptime must be an integer"]}"#)
            .create_async()
            .await;

        let client = HttpClient::with_defaults().unwrap();
        let url = join_url(&server.url(), "/telemetry");
        let result = client.post_json(&url, &serde_json::json!({})).await;

        match result {
            Err(HttpError::Server { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "uptime must be an integer");
            }
            other => panic!("expected server error, got {:?}", other.map(|r| r.status())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_network_error() {
        let client = HttpClient::new(
            HttpConfig::default().with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        // Port 9 (discard) on localhost is closed in test environments.
        let result = client.get("http://127.0.0.1:9/update/check", &[]).await;
        assert!(matches!(result, Err(HttpError::Network(_))));
    }
}
