//! Batch executor.

use crate::client::{FetchClient, RequestOptions, ResponseEnvelope};
use crate::{BoxStream, Error, Result};
use futures::{future, stream, StreamExt};
use reqwest::Method;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct BatchResult<T, E> {
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<(usize, E)>,
    pub execution_time: Duration,
    pub total_processed: usize,
}

impl<T, E> BatchResult<T, E> {
    pub fn new() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            execution_time: Duration::ZERO,
            total_processed: 0,
        }
    }
    pub fn add_success(&mut self, i: usize, r: T) {
        self.successes.push((i, r));
    }
    pub fn add_failure(&mut self, i: usize, e: E) {
        self.failures.push((i, e));
    }
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.successes.len() as f64 / self.total_processed as f64
        }
    }
}
impl<T, E> Default for BatchResult<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// How many live calls a batch keeps in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Every miss at once.
    Parallel,
    Sequential,
    Concurrent { max_concurrency: usize },
}
impl Default for BatchStrategy {
    fn default() -> Self {
        BatchStrategy::Parallel
    }
}
impl BatchStrategy {
    fn in_flight(&self, total: usize) -> usize {
        match *self {
            BatchStrategy::Parallel => total.max(1),
            BatchStrategy::Sequential => 1,
            BatchStrategy::Concurrent { max_concurrency } => max_concurrency.max(1),
        }
    }
}

/// Fan-out over many URIs through one client.
///
/// Every URI is prepared (cache-checked) before any live call starts; the
/// misses then run concurrently according to the [`BatchStrategy`]. Results are
/// yielded in input order and the cache is committed once, after the last item.
pub struct ConcurrentBatch<'a> {
    client: &'a FetchClient,
    method: Method,
    strategy: BatchStrategy,
}

impl<'a> ConcurrentBatch<'a> {
    pub fn new(client: &'a FetchClient) -> Self {
        Self {
            client,
            method: Method::GET,
            strategy: BatchStrategy::default(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> BatchStrategy {
        self.strategy
    }

    /// One item per URI, in input order, each a `Result`.
    ///
    /// Nothing happens until the stream is polled. Dropping the stream early
    /// drops in-flight calls and leaves the cache uncommitted.
    pub fn run_many<I, S>(&self, uris: I, options: RequestOptions) -> BoxStream<'a, ResponseEnvelope>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let uris: Vec<String> = uris.into_iter().map(Into::into).collect();
        let client = self.client;
        let method = self.method.clone();
        let in_flight = self.strategy.in_flight(uris.len());

        let prepared = async move {
            let mut envelopes = Vec::with_capacity(uris.len());
            for uri in &uris {
                envelopes.push(client.prepare(method.clone(), uri, options.clone()).await);
            }
            let hits = envelopes
                .iter()
                .filter(|e| matches!(e, Ok(env) if env.is_hit()))
                .count();
            debug!(total = envelopes.len(), hits, in_flight, "batch prepared");
            envelopes
        };

        let results = stream::once(prepared).flat_map(move |envelopes| {
            stream::iter(envelopes)
                .map(move |prepared| async move {
                    match prepared {
                        Ok(envelope) => client.run(envelope).await,
                        Err(e) => Err(e),
                    }
                })
                .buffered(in_flight)
        });

        let commit = stream::once(async move {
            if let Err(e) = client.commit().await {
                warn!(error = %e, "batch cache commit failed");
            }
        })
        .filter_map(|_| future::ready(None::<Result<ResponseEnvelope>>));

        Box::pin(results.chain(commit))
    }

    /// Drain [`run_many`](Self::run_many) into indexed successes and failures.
    pub async fn collect<I, S>(
        &self,
        uris: I,
        options: RequestOptions,
    ) -> BatchResult<ResponseEnvelope, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = Instant::now();
        let mut result = BatchResult::new();
        let mut stream = self.run_many(uris, options);
        let mut index = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(envelope) => result.add_success(index, envelope),
                Err(e) => result.add_failure(index, e),
            }
            index += 1;
        }
        result.execution_time = start.elapsed();
        result.total_processed = index;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Headers, RawResponse, Transport, TransportError, TransportRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Echoes the path; `/slow` paths answer last, `/missing` is a 404.
    struct Echo {
        calls: AtomicUsize,
        peak: AtomicUsize,
        active: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, req: &TransportRequest) -> std::result::Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let path = req.url.path().to_string();
            let delay = if path.starts_with("/slow") { 40 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            let status = if path == "/missing" { 404 } else { 200 };
            Ok(RawResponse::new(status, Headers::new(), path))
        }
        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn setup() -> (FetchClient, Arc<Echo>) {
        let transport = Arc::new(Echo {
            calls: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        });
        let client = FetchClient::builder()
            .base_uri("https://api.example.com")
            .transport(transport.clone())
            .build()
            .unwrap();
        (client, transport)
    }

    #[tokio::test]
    async fn test_order_follows_input() {
        let (client, _) = setup();
        let batch = ConcurrentBatch::new(&client);
        let result = batch
            .collect(["/slow-a", "/b", "/slow-c", "/d"], RequestOptions::new())
            .await;
        assert!(result.all_succeeded());
        let bodies: Vec<_> = result
            .successes
            .iter()
            .map(|(_, env)| env.text().unwrap())
            .collect();
        assert_eq!(bodies, ["/slow-a", "/b", "/slow-c", "/d"]);
    }

    #[tokio::test]
    async fn test_commits_once_after_batch() {
        let (client, transport) = setup();
        let batch = ConcurrentBatch::new(&client);
        let first = batch.collect(["/a", "/b"], RequestOptions::new()).await;
        assert_eq!(first.success_count(), 2);
        assert_eq!(client.cache().unwrap().pending_writes(), 0);
        assert_eq!(client.cache().unwrap().stats().commits, 1);

        let second = batch.collect(["/a", "/b", "/c"], RequestOptions::new()).await;
        assert!(second.successes[0].1.is_hit());
        assert!(second.successes[1].1.is_hit());
        assert!(!second.successes[2].1.is_hit());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failures_keep_their_index() {
        let (client, _) = setup();
        let result = ConcurrentBatch::new(&client)
            .collect(["/a", "/missing", "/c"], RequestOptions::new())
            .await;
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].0, 1);
        assert!(result.failures[0].1.is_not_found());
        assert_eq!(result.total_processed, 3);
    }

    #[tokio::test]
    async fn test_sequential_strategy_limits_in_flight() {
        let (client, transport) = setup();
        let result = ConcurrentBatch::new(&client)
            .with_strategy(BatchStrategy::Sequential)
            .collect(["/a", "/b", "/c"], RequestOptions::new())
            .await;
        assert_eq!(result.success_count(), 3);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (client, _) = setup();
        let result = ConcurrentBatch::new(&client)
            .collect(Vec::<String>::new(), RequestOptions::new())
            .await;
        assert_eq!(result.total_processed, 0);
        assert_eq!(result.success_rate(), 0.0);
    }
}
