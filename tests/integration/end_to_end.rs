//! End-to-end requests against a mock server

use crate::mock_server::MockServerFixture;
use content_fetch::RequestOptions;
use mockito::Matcher;
use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/posts")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":1}"#)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.client();

    let first = client.get("/posts?page=1").await.unwrap();
    assert!(!first.is_hit());
    let second = client.get("/posts?page=1").await.unwrap();
    assert!(second.is_hit());

    assert_eq!(client.decode(&first, None).unwrap(), json!({"id": 1}));
    assert_eq!(client.decode(&second, None).unwrap(), json!({"id": 1}));
    assert_eq!(second.header("content-type").unwrap(), Some("application/json"));
    assert_eq!(second.age(), Some(0));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_defaults_and_caller_options_reach_the_wire() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/search")
        .match_header("accept", "application/json")
        .match_header("x-trace", "abc")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("locale".into(), "de".into()),
            Matcher::UrlEncoded("q".into(), "rust".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let client = fixture
        .builder()
        .default_header("Accept", "application/json")
        .default_query("locale", "en")
        .build()
        .unwrap();

    let options = RequestOptions::new()
        .with_header("X-Trace", "abc")
        .with_query("locale", "de")
        .with_query("q", "rust")
        .with_decoder("json");
    let value = client.fetch_value("/search", options).await.unwrap();
    assert_eq!(value, json!([]));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_decoder_inferred_from_extension() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", "/posts/hello.md")
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body("---\ntitle: Hello\n---\nBody\n")
        .create_async()
        .await;

    let client = fixture.client();
    let value = client
        .fetch_value("/posts/hello.md", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(value["meta"]["title"], "Hello");
    assert_eq!(value["content"], "Body\n");
}

#[tokio::test]
async fn test_undecodable_body_is_a_decoder_error() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", "/broken")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{not json")
        .create_async()
        .await;

    let client = fixture.client();
    let err = client
        .fetch_value("/broken", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, content_fetch::Error::Decoder(_)));
}

#[tokio::test]
async fn test_exists_follows_status() {
    let mut fixture = MockServerFixture::new().await;
    let _found = fixture
        .server
        .mock("HEAD", "/present")
        .with_status(200)
        .create_async()
        .await;
    let _missing = fixture
        .server
        .mock("HEAD", "/absent")
        .with_status(404)
        .create_async()
        .await;

    let client = fixture.client();
    assert!(client.exists("/present").await.unwrap());
    assert!(!client.exists("/absent").await.unwrap());
}

#[tokio::test]
async fn test_graphql_posts_query_and_returns_data() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJson(json!({
            "query": "query($id: ID!) { post(id: $id) { title } }",
            "variables": {"id": "7"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"post":{"title":"Seven"}}}"#)
        .expect(2)
        .create_async()
        .await;

    let client = fixture.client();
    for _ in 0..2 {
        let data = client
            .graphql(
                "/graphql",
                "query($id: ID!) { post(id: $id) { title } }",
                Some(json!({"id": "7"})),
            )
            .await
            .unwrap();
        assert_eq!(data["post"]["title"], "Seven");
    }

    // POST is not cacheable by default, so both calls hit the server.
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_cached_when_configured() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"data":{"n":1}}"#)
        .expect(2)
        .create_async()
        .await;

    let client = fixture
        .builder()
        .cacheable_methods(["GET", "HEAD", "POST"])
        .build()
        .unwrap();

    client.graphql("/graphql", "{ n }", None).await.unwrap();
    client.graphql("/graphql", "{ n }", None).await.unwrap();
    // A different query is a different key.
    client.graphql("/graphql", "{ m: n }", None).await.unwrap();

    mock.assert_async().await;

    let envelope = client
        .prepare(
            Method::POST,
            "/graphql",
            RequestOptions::new().with_json(json!({"query": "{ n }"})),
        )
        .await
        .unwrap();
    assert!(envelope.is_hit());
}
