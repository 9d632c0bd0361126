//! Transport layer: the only place that talks to the network.
//!
//! The orchestrator speaks to a [`Transport`] trait object so the live call can be
//! swapped for a retrying wrapper ([`RetryingTransport`]) or an in-process double
//! in tests. A transport returns `Ok` for *any* HTTP response, including 4xx/5xx;
//! `Err` is reserved for requests that never produced a response.

mod http;
mod retry;

pub use http::HttpTransport;
pub use retry::RetryingTransport;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Response headers keyed by lowercased name, each with every received value.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Request payload. Kept structured so the identifier can serialize it canonically.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Form(BTreeMap<String, String>),
    Bytes(Bytes),
}

impl RequestBody {
    /// Stable textual form used for request identification.
    pub fn canonical(&self) -> String {
        match self {
            RequestBody::Json(v) => v.to_string(),
            RequestBody::Text(s) => s.clone(),
            RequestBody::Form(fields) => fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
            RequestBody::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// A fully resolved request, ready to be put on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    /// Caller metadata for custom transports. Never sent on the wire.
    pub extensions: BTreeMap<String, Value>,
    /// Correlation id for logs (the request's cache key).
    pub correlation_id: Option<String>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            extensions: BTreeMap::new(),
            correlation_id: None,
        }
    }
}

/// Raw status/headers/body triple, produced either by the wire or by a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// First value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<RawResponse, TransportError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}
