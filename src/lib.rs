//! # content-fetch
//!
//! 带缓存感知的 HTTP/GraphQL 内容客户端：请求准备与执行分离、稳定缓存键、延迟提交与并发批量请求。
//!
//! A cache-aware HTTP/GraphQL content client that fetches remote content,
//! caches responses and hands callers one uniform response type whether the data
//! came from the wire or from the cache.
//!
//! ## Overview
//!
//! Every request goes through two phases:
//!
//! 1. **prepare**: merge options, resolve the URI, derive a stable cache key and
//!    consult the cache. No network I/O; a hit comes back already completed.
//! 2. **run**: execute what is still scheduled, classify the status, and queue
//!    the successful response for a *deferred* cache write.
//!
//! Deferred writes become visible to other requests only after
//! [`FetchClient::commit`], so a batch of requests costs one cache flush.
//!
//! ## Key Features
//!
//! - **Unified envelope**: [`ResponseEnvelope`] reads the same for live and cached responses
//! - **Pluggable caching**: [`cache::CacheBackend`] with capability flags, tags and pruning
//! - **Batching**: order-preserving concurrent fan-out via [`batch::ConcurrentBatch`]
//! - **Resilience**: opt-in retry with exponential backoff via [`transport::RetryingTransport`]
//! - **Decoding**: JSON, NDJSON, text and Markdown front matter via [`pipeline`]
//! - **Sub-requests**: nested fetches that suppress HTTP-level failures by default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use content_fetch::{FetchClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> content_fetch::Result<()> {
//!     let client = FetchClient::builder()
//!         .base_uri("https://api.example.com")
//!         .default_header("accept", "application/json")
//!         .retry_enabled(true)
//!         .build()?;
//!
//!     let post = client
//!         .fetch_value("/posts", RequestOptions::new().with_query("page", "1"))
//!         .await?;
//!     println!("{post}");
//!
//!     // Served from the cache, no network call.
//!     let again = client.get("/posts?page=1").await?;
//!     assert!(again.is_hit());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Orchestrator, builder, config, envelope, retry policy |
//! | [`cache`] | Request identifiers, cache store, backends |
//! | [`batch`] | Concurrent fan-out over many URIs |
//! | [`transport`] | Transport trait, reqwest transport, retrying transport |
//! | [`pipeline`] | Decoder selection and built-in decoders |
//! | [`telemetry`] | Optional `tracing` subscriber setup |

pub mod batch;
pub mod cache;
pub mod client;
pub mod pipeline;
pub mod telemetry;
pub mod transport;

// Re-export main types for convenience
pub use client::{
    ClientConfig, FetchClient, FetchClientBuilder, RequestOptions, ResponseEnvelope,
    RetryPolicy, SessionSnapshot,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
