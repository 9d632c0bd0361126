//! Retry bounds and error suppression scope

use crate::mock_server::{MockServerFixture, Unreachable};
use content_fetch::{Error, FetchClient, RequestOptions, RetryPolicy};
use std::time::Duration;

fn fast_retries(attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(attempts)
        .with_initial_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_retry_stops_after_max_attempts_on_transport_failure() {
    let transport = Unreachable::new();
    let client = FetchClient::builder()
        .base_uri("https://api.example.com")
        .transport(transport.clone())
        .retry_policy(fast_retries(3))
        .build()
        .unwrap();

    let err = client.get("/flaky").await.unwrap_err();
    assert!(err.is_transport_failure());
    assert!(matches!(err, Error::FailedRequest { status: None, .. }));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_retry_stops_after_max_attempts_on_server_error() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/unstable")
        .with_status(503)
        .with_body("try later")
        .expect(4)
        .create_async()
        .await;

    let client = fixture.builder().retry_policy(fast_retries(4)).build().unwrap();
    let err = client.get("/unstable").await.unwrap_err();
    assert!(matches!(err, Error::FailedRequest { status: Some(503), .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_transient_status_is_not_retried() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/gone")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.builder().retry_policy(fast_retries(3)).build().unwrap();
    let err = client.get("/gone").await.unwrap_err();
    assert!(err.is_not_found());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_suppressed_404_does_not_raise() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not here")
        .create_async()
        .await;

    let client = fixture.client();
    let envelope = client
        .fetch(
            reqwest::Method::GET,
            "/missing",
            RequestOptions::new().suppress_errors(true),
        )
        .await
        .unwrap();
    assert!(envelope.is_failed());
    assert!(!envelope.is_success());
    assert_eq!(envelope.status().unwrap(), 404);
    assert_eq!(envelope.text().unwrap(), "not here");

    // Without suppression the same response raises.
    let err = client.get("/missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_sub_requests_suppress_http_failures_by_default() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", "/related/9")
        .with_status(500)
        .create_async()
        .await;

    let client = fixture.client();
    let sub = client.sub_request();
    let envelope = sub.get("/related/9").await.unwrap();
    assert!(envelope.is_failed());

    // A sub-request can opt back in per call.
    let err = sub
        .fetch(
            reqwest::Method::GET,
            "/related/9",
            RequestOptions::new().suppress_errors(false),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));

    let snapshot = client.session();
    assert_eq!(snapshot.suppressed_failures, 1);
    assert_eq!(snapshot.failures, 1);
}

#[tokio::test]
async fn test_connection_errors_are_never_suppressed() {
    let client = FetchClient::builder()
        .base_uri("http://127.0.0.1:1")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
        .sub_request();

    let err = client
        .fetch(
            reqwest::Method::GET,
            "/anything",
            RequestOptions::new().suppress_errors(true),
        )
        .await
        .unwrap_err();
    assert!(err.is_transport_failure());
}
