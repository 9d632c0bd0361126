//! Mock HTTP server setup and scripted transports for integration tests

use async_trait::async_trait;
use content_fetch::transport::{Headers, RawResponse, Transport, TransportError, TransportRequest};
use content_fetch::{FetchClient, FetchClientBuilder};
use mockito::{Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        content_fetch::telemetry::init_tracing();
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Builder pointed at the mock server, with everything else default.
    pub fn builder(&self) -> FetchClientBuilder {
        FetchClient::builder().base_uri(&self.base_url)
    }

    pub fn client(&self) -> FetchClient {
        self.builder().build().expect("client builds")
    }
}

/// Transport that never reaches a server.
pub struct Unreachable {
    pub calls: AtomicUsize,
}

impl Unreachable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for Unreachable {
    async fn send(&self, req: &TransportRequest) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Connect(format!("connection refused: {}", req.url)))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

/// Transport answering every request with its own path after a random delay.
pub struct RandomLatency {
    pub calls: AtomicUsize,
    pub completion_order: std::sync::Mutex<Vec<String>>,
}

impl RandomLatency {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            completion_order: std::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for RandomLatency {
    async fn send(&self, req: &TransportRequest) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = rand::random_range(1..40u64);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let path = req.url.path().to_string();
        self.completion_order.lock().unwrap().push(path.clone());
        let mut headers = Headers::new();
        headers.insert("content-type".into(), vec!["text/plain".into()]);
        Ok(RawResponse::new(200, headers, path))
    }

    fn name(&self) -> &'static str {
        "random-latency"
    }
}
