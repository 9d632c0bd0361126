//! 响应缓存模块：可插拔后端、延迟写入与标签失效。
//!
//! # Response Caching Module
//!
//! This module provides the cache half of the request pipeline: stable request
//! identifiers, an item-level store with deferred writes, and pluggable backends.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestIdentifier`] | Derives a [`CacheKey`] from method, effective URI and body |
//! | [`CacheStore`] | Default lifetime, active tags, deferred writes + commit, pruning |
//! | [`CacheItem`] | A keyed slot returned by lookups and handed back to saves |
//! | [`CachedResponse`] | Stored `{http_code, response_headers, body}` shape |
//! | [`CacheBackend`] | Trait for implementing custom backends |
//! | [`MemoryCache`] | In-memory LRU backend with tags and pruning |
//! | [`NullCache`] | No-op backend without optional capabilities |
//!
//! ## Example
//!
//! ```rust
//! use content_fetch::cache::{lifetime, CacheConfig, CacheItem, CacheKey, CacheStore, MemoryCache};
//! use std::sync::Arc;
//!
//! # async fn demo() -> content_fetch::Result<()> {
//! let store = CacheStore::new(
//!     CacheConfig::new().with_lifetime(lifetime::DAY),
//!     Arc::new(MemoryCache::new(1000)),
//! );
//! store.set_tags(["posts"])?;
//!
//! let mut item = CacheItem::new(CacheKey::new("posts:1"));
//! item.set(b"payload".to_vec());
//! store.save_deferred(item)?;
//! store.commit().await?;
//!
//! store.invalidate_tags(&["posts".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod item;
mod key;
mod store;

pub use backend::{BackendCapabilities, CacheBackend, MemoryCache, NullCache};
pub use item::{lifetime, CacheItem, CachedResponse};
pub use key::{CacheKey, RequestIdentifier};
pub use store::{CacheConfig, CacheStats, CacheStore};
