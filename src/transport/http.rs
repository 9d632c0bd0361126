use super::{Headers, RawResponse, RequestBody, Transport, TransportError, TransportRequest};
use crate::client::ClientConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport.
///
/// Redirects are followed by the client itself (up to `max_redirects`), so a 3xx only
/// reaches the caller once that budget is exhausted.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout = env::var("CONTENT_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.timeout());
        let max_redirects = env::var("CONTENT_FETCH_MAX_REDIRECTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(config.max_redirects);

        let redirect = if max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(max_redirects)
        };

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .pool_max_idle_per_host(
                env::var("CONTENT_FETCH_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("CONTENT_FETCH_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            crate::Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                crate::ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, request: &TransportRequest, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(request.timeout.unwrap_or(self.timeout))
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &TransportRequest,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        req = match &request.body {
            Some(RequestBody::Json(v)) => req.json(v),
            Some(RequestBody::Text(s)) => req.body(s.clone()),
            Some(RequestBody::Form(fields)) => req.form(fields),
            Some(RequestBody::Bytes(b)) => req.body(b.clone()),
            None => req,
        };

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| self.map_error(request, e))?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            // HeaderName is already lowercase.
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(request, e))?;

        debug!(
            method = %request.method,
            uri = %request.url,
            http_status = status,
            body_len = body.len(),
            "http transport received response"
        );

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
