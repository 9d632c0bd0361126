//! Cache round-trips, commit visibility, tags and capabilities

use crate::mock_server::{MockServerFixture, Unreachable};
use content_fetch::cache::{
    lifetime, CacheConfig, CacheItem, CacheKey, CacheStore, CachedResponse, MemoryCache, NullCache,
};
use content_fetch::transport::Headers;
use content_fetch::{Error, FetchClient, RequestOptions};
use mockito::Matcher;
use reqwest::Method;
use std::sync::Arc;

#[tokio::test]
async fn test_prepare_reconstructs_cached_entry_without_network() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/articles/1")
        .expect(0)
        .create_async()
        .await;
    let client = fixture.client();

    let scheduled = client
        .prepare(Method::GET, "/articles/1", RequestOptions::new())
        .await
        .unwrap();
    assert!(!scheduled.is_hit());

    let mut headers = Headers::new();
    headers.insert("content-type".into(), vec!["application/json".into()]);
    headers.insert("set-cookie".into(), vec!["a=1".into(), "b=2".into()]);
    let cached = CachedResponse {
        http_code: 200,
        response_headers: headers.clone(),
        body: r#"{"title":"cached"}"#.to_string(),
    };
    let mut item = CacheItem::new(scheduled.cache_key().clone());
    item.set(cached.to_bytes().unwrap());
    assert!(client.cache().unwrap().save(item).await.unwrap());

    let envelope = client
        .prepare(Method::GET, "/articles/1", RequestOptions::new())
        .await
        .unwrap();
    assert!(envelope.is_hit());
    assert!(!envelope.is_cacheable());
    assert_eq!(envelope.status().unwrap(), 200);
    assert_eq!(envelope.headers().unwrap(), &headers);
    assert_eq!(envelope.text().unwrap(), r#"{"title":"cached"}"#);

    // run() on a hit is a no-op apart from counting.
    let envelope = client.run(envelope).await.unwrap();
    assert!(envelope.is_hit());
    assert_eq!(client.session().live_requests, 0);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_incomplete_entry_is_a_miss() {
    let transport = Unreachable::new();
    let client = FetchClient::builder()
        .base_uri("https://api.example.com")
        .transport(transport.clone())
        .build()
        .unwrap();

    let scheduled = client
        .prepare(Method::GET, "/a", RequestOptions::new())
        .await
        .unwrap();
    let mut item = CacheItem::new(scheduled.cache_key().clone());
    item.set(br#"{"http_code":200,"body":"no headers"}"#.to_vec());
    client.cache().unwrap().save(item).await.unwrap();

    let envelope = client
        .prepare(Method::GET, "/a", RequestOptions::new())
        .await
        .unwrap();
    assert!(!envelope.is_hit());
    assert!(envelope.is_cacheable());
}

#[tokio::test]
async fn test_deferred_writes_visible_after_commit_only() {
    let backend = Arc::new(MemoryCache::new(100));
    let writer = CacheStore::new(CacheConfig::new(), backend.clone());
    let reader = CacheStore::new(CacheConfig::new(), backend);
    let key = CacheKey::new("feed");

    let mut item = CacheItem::new(key.clone());
    item.set(b"v1".to_vec());
    assert!(writer.save_deferred(item).unwrap());

    assert!(!reader.get_item(&key).await.unwrap().is_hit());
    assert!(writer.commit().await.unwrap());
    let found = reader.get_item(&key).await.unwrap();
    assert!(found.is_hit());
    assert_eq!(found.get(), Some(&b"v1"[..]));
}

#[tokio::test]
async fn test_tag_invalidation_through_client() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(r"^/tagged/\d$".into()))
        .with_status(200)
        .with_body("ok")
        .expect(4)
        .create_async()
        .await;

    let client = fixture.builder().cache_tags(["t"]).build().unwrap();
    client.get("/tagged/1").await.unwrap();
    client.get("/tagged/2").await.unwrap();
    assert!(client.get("/tagged/1").await.unwrap().is_hit());

    let store = client.cache().unwrap();
    assert!(store.invalidate_tags(&["t".to_string()]).await.unwrap());

    assert!(!client.get("/tagged/1").await.unwrap().is_hit());
    assert!(!client.get("/tagged/2").await.unwrap().is_hit());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_capability_errors_on_plain_backend() {
    let store = CacheStore::new(CacheConfig::new(), Arc::new(NullCache::new()));
    assert!(!store.capabilities().tags);

    let err = store.set_tags(["t"]).unwrap_err();
    assert!(matches!(err, Error::CacheCapability { .. }));
    let err = store.invalidate_tags(&["t".to_string()]).await.unwrap_err();
    assert!(err.is_capability_error());
    let err = store.prune(1.0).await.unwrap_err();
    assert!(err.is_capability_error());
}

#[tokio::test]
async fn test_prune_probability() {
    let store = CacheStore::new(
        CacheConfig::new().with_lifetime(lifetime::MINUTE),
        Arc::new(MemoryCache::new(10)),
    );
    assert!(store.prune(1.0).await.unwrap());
    assert!(matches!(
        store.prune(0.0).await,
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        store.prune(1.5).await,
        Err(Error::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_cache_disabled_never_attaches_handle() {
    let client = FetchClient::builder()
        .base_uri("https://api.example.com")
        .transport(Unreachable::new())
        .cache_enabled(false)
        .build()
        .unwrap();
    let envelope = client
        .prepare(Method::GET, "/a", RequestOptions::new())
        .await
        .unwrap();
    assert!(!envelope.is_cacheable());
}
