//! In-memory transport for offline runs and tests.
//!
//! Routes match when their pattern is a substring of the request's full URL
//! (query string included); the first registered match wins. Every executed
//! request is recorded so callers can inspect what would have gone upstream.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{FetchError, HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
pub enum StubReply {
    Body { status: u16, body: String },
    Timeout,
    NetworkFailure(String),
    Delayed(Duration, Box<StubReply>),
}

impl StubReply {
    pub fn json(body: impl Into<String>) -> Self {
        StubReply::Body { status: 200, body: body.into() }
    }

    pub fn text(body: impl Into<String>) -> Self {
        StubReply::Body { status: 200, body: body.into() }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        StubReply::Body { status, body: body.into() }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        StubReply::Delayed(delay, Box::new(self))
    }
}

#[derive(Default)]
pub struct StubTransport {
    routes: Vec<(String, StubReply)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: &str, reply: StubReply) -> Self {
        self.routes.push((pattern.to_string(), reply));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded requests whose base URL contains `pattern`.
    pub fn requests_to(&self, pattern: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(pattern))
            .collect()
    }

    fn find_reply(&self, full_url: &str) -> Option<StubReply> {
        self.routes
            .iter()
            .find(|(pattern, _)| full_url.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let full_url = request.full_url()?;
        let mut reply = self
            .find_reply(&full_url)
            .unwrap_or_else(|| StubReply::status(404, "no stub route"));

        loop {
            match reply {
                StubReply::Body { status, body } => return Ok(HttpResponse { status, body }),
                StubReply::Timeout => return Err(FetchError::Timeout(request.timeout)),
                StubReply::NetworkFailure(message) => return Err(FetchError::Network(message)),
                StubReply::Delayed(delay, inner) => {
                    if delay >= request.timeout {
                        tokio::time::sleep(request.timeout).await;
                        return Err(FetchError::Timeout(request.timeout));
                    }
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
