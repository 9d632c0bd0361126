//! 批量请求模块：预先检查缓存，并发执行未命中的请求，按输入顺序返回结果。
//!
//! # Batch Fetching Module
//!
//! Fans many independent requests out through one [`FetchClient`](crate::FetchClient).
//! Every URI is prepared up front (cheap, may hit the cache), only the misses go
//! to the network, and the deferred cache queue is committed exactly once when
//! the batch finishes.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ConcurrentBatch`] | Runs a batch as an order-preserving stream |
//! | [`BatchStrategy`] | Execution strategy (Sequential, Parallel, Concurrent) |
//! | [`BatchResult`] | Indexed successes and failures with timing |
//!
//! ## Example
//!
//! ```rust,no_run
//! use content_fetch::batch::{BatchStrategy, ConcurrentBatch};
//! use content_fetch::{FetchClient, RequestOptions};
//! use futures::StreamExt;
//!
//! # async fn demo() -> content_fetch::Result<()> {
//! let client = FetchClient::new("https://api.example.com")?;
//! let batch = ConcurrentBatch::new(&client)
//!     .with_strategy(BatchStrategy::Concurrent { max_concurrency: 4 });
//!
//! let mut results = batch.run_many(["/posts/1", "/posts/2"], RequestOptions::new());
//! while let Some(envelope) = results.next().await {
//!     println!("{}", envelope?.text()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Strategies
//!
//! - **Sequential**: One live call at a time
//! - **Parallel**: Every cache miss at once (default)
//! - **Concurrent**: Up to N live calls at once (recommended for rate-limited APIs)

mod executor;

pub use executor::{BatchResult, BatchStrategy, ConcurrentBatch};
