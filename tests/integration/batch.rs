//! Integration tests for batch fetching

use crate::mock_server::{MockServerFixture, RandomLatency};
use content_fetch::batch::{BatchStrategy, ConcurrentBatch};
use content_fetch::{FetchClient, RequestOptions};
use futures::StreamExt;
use std::sync::atomic::Ordering;

fn random_latency_client() -> (FetchClient, std::sync::Arc<RandomLatency>) {
    let transport = RandomLatency::new();
    let client = FetchClient::builder()
        .base_uri("https://api.example.com")
        .transport(transport.clone())
        .build()
        .unwrap();
    (client, transport)
}

#[tokio::test]
async fn test_positions_match_input_regardless_of_completion_order() {
    content_fetch::telemetry::init_tracing();
    let (client, _) = random_latency_client();
    let uris: Vec<String> = (0..12).map(|i| format!("/items/{}", i)).collect();

    for _ in 0..3 {
        client.cache().unwrap().clear().await.unwrap();
        let bodies: Vec<String> = client
            .run_many(uris.clone(), RequestOptions::new())
            .map(|r| r.unwrap().text().unwrap())
            .collect()
            .await;
        assert_eq!(bodies, uris);
    }
}

#[tokio::test]
async fn test_abc_ordering() {
    let (client, transport) = random_latency_client();
    let bodies: Vec<String> = client
        .run_many(["/a", "/b", "/c"], RequestOptions::new())
        .map(|r| r.unwrap().text().unwrap())
        .collect()
        .await;
    assert_eq!(bodies, ["/a", "/b", "/c"]);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert_eq!(transport.completion_order.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_hits_skip_the_network_and_commit_happens_once() {
    let (client, transport) = random_latency_client();
    let store = client.cache().unwrap();

    let first: Vec<_> = client
        .run_many(["/a", "/b"], RequestOptions::new())
        .collect()
        .await;
    assert!(first.iter().all(|r| r.is_ok()));
    assert_eq!(store.stats().commits, 1);
    assert_eq!(store.pending_writes(), 0);

    let second: Vec<_> = client
        .run_many(["/a", "/c", "/b"], RequestOptions::new())
        .map(|r| r.unwrap())
        .collect()
        .await;
    let hits: Vec<bool> = second.iter().map(|e| e.is_hit()).collect();
    assert_eq!(hits, [true, false, true]);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.stats().commits, 2);
}

#[tokio::test]
async fn test_dropped_stream_leaves_queue_uncommitted() {
    let (client, _) = random_latency_client();
    {
        let mut stream = client.run_many(["/a", "/b", "/c"], RequestOptions::new());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text().unwrap(), "/a");
    }
    let store = client.cache().unwrap();
    assert_eq!(store.stats().commits, 0);
}

#[tokio::test]
async fn test_batch_with_partial_failures_against_server() {
    let mut fixture = MockServerFixture::new().await;
    let ok = fixture
        .server
        .mock("GET", mockito::Matcher::Regex(r"^/ok/\d$".into()))
        .with_status(200)
        .with_body("fine")
        .expect(2)
        .create_async()
        .await;
    let _missing = fixture
        .server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let client = fixture.client();
    let result = ConcurrentBatch::new(&client)
        .with_strategy(BatchStrategy::Concurrent { max_concurrency: 2 })
        .collect(["/ok/1", "/missing", "/ok/2"], RequestOptions::new())
        .await;

    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures[0].0, 1);
    assert!(result.failures[0].1.is_not_found());
    assert_eq!(
        result.successes.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        [0, 2]
    );
    ok.assert_async().await;
}

#[tokio::test]
async fn test_sub_request_batch_suppresses_failures() {
    let mut fixture = MockServerFixture::new().await;
    let _missing = fixture
        .server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let client = fixture.client().sub_request();
    let result = ConcurrentBatch::new(&client)
        .collect(["/missing"], RequestOptions::new())
        .await;
    assert!(result.all_succeeded());
    assert!(result.successes[0].1.is_failed());
}
