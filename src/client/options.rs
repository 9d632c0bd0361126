use crate::transport::RequestBody;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-request options.
///
/// Merged over the client's defaults by [`RequestOptions::merged_over`]: scalar
/// options set here win, while the map-valued ones (`headers`, `query`, `extra`) are
/// merged key by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    /// Handed to the transport as [`TransportRequest::extensions`](crate::transport::TransportRequest::extensions).
    /// Not part of the cache key.
    pub extra: BTreeMap<String, Value>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub expected_status: Option<u16>,
    pub suppress_errors: Option<bool>,
    pub decoder: Option<String>,
    /// `Some(false)` bypasses the cache for this request.
    pub cache: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header names are stored lowercased so merging is case-insensitive.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn suppress_errors(mut self, suppress: bool) -> Self {
        self.suppress_errors = Some(suppress);
        self
    }

    pub fn with_decoder(mut self, decoder: impl Into<String>) -> Self {
        self.decoder = Some(decoder.into());
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = Some(false);
        self
    }

    /// Merge `self` over `defaults`.
    pub fn merged_over(self, defaults: &RequestOptions) -> RequestOptions {
        let mut headers = defaults.headers.clone();
        headers.extend(
            self.headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v)),
        );
        let mut query = defaults.query.clone();
        query.extend(self.query);
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra);

        RequestOptions {
            headers,
            query,
            extra,
            body: self.body.or_else(|| defaults.body.clone()),
            timeout: self.timeout.or(defaults.timeout),
            expected_status: self.expected_status.or(defaults.expected_status),
            suppress_errors: self.suppress_errors.or(defaults.suppress_errors),
            decoder: self.decoder.or_else(|| defaults.decoder.clone()),
            cache: self.cache.or(defaults.cache),
        }
    }
}
