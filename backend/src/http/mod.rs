//! Outbound HTTP substrate shared by every fetcher.
//!
//! Providers never talk to `reqwest` directly; they build an [`HttpRequest`]
//! and hand it to an [`HttpClient`], which delegates to a pluggable
//! [`HttpTransport`]. Timeouts are carried on each request and enforced by the
//! transport, so a timed-out call surfaces as an ordinary [`FetchError`].

pub mod stub;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use stub::{StubReply, StubTransport};

/// Browser-like user agent for pages that reject bare clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Response decoding failed: {0}")]
    Decode(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// A GET request description; the transport decides how to execute it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// URL with the query string applied, as it would go on the wire.
    pub fn full_url(&self) -> Result<String, FetchError> {
        let url = url::Url::parse_with_params(&self.url, &self.query)
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", self.url, e)))?;
        Ok(url.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// Production transport backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(request.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(request.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        Ok(HttpResponse { status, body })
    }
}

/// Cheap-to-clone handle every provider holds.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn with_reqwest() -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    pub async fn get_text(&self, request: HttpRequest) -> Result<String, FetchError> {
        debug!("GET {} ({} query params)", request.url, request.query.len());
        let response = self.transport.execute(&request).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                url: request.url,
            });
        }
        Ok(response.body)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, FetchError> {
        let body = self.get_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn test_request_builder_and_full_url() {
        let request = HttpRequest::get("https://api.example.com/v1/items")
            .query("limit", 10)
            .query("symbol", "BTC,ETH")
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(5));

        assert_eq!(request.query_param("limit"), Some("10"));
        assert_eq!(request.header_value("accept"), Some("application/json"));
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert_eq!(
            request.full_url().unwrap(),
            "https://api.example.com/v1/items?limit=10&symbol=BTC%2CETH"
        );
    }

    #[tokio::test]
    async fn test_get_json_decodes_success_body() {
        let stub = Arc::new(StubTransport::new().on("/items", StubReply::json(r#"{"value": 7}"#)));
        let client = HttpClient::new(stub.clone());

        let payload: Payload = client
            .get_json(HttpRequest::get("https://api.example.com/items"))
            .await
            .unwrap();

        assert_eq!(payload.value, 7);
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let stub = Arc::new(StubTransport::new().on("/items", StubReply::status(500, "boom")));
        let client = HttpClient::new(stub);

        let result = client.get_text(HttpRequest::get("https://api.example.com/items")).await;

        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_decode_error() {
        let stub = Arc::new(StubTransport::new().on("/items", StubReply::json("not json")));
        let client = HttpClient::new(stub);

        let result: Result<Payload, _> = client.get_json(HttpRequest::get("https://api.example.com/items")).await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }
}
