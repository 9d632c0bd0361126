//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Optional capabilities a backend advertises once, at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// Entries can carry tags and be invalidated by tag.
    pub tags: bool,
    /// Expired entries can be evicted on demand.
    pub prune: bool,
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    /// Store `value`. A zero `ttl` never expires. Backends without tag support ignore `tags`.
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration, tags: &[String])
        -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    /// Remove every entry carrying any of `tags`.
    async fn invalidate_tags(&self, _tags: &[String]) -> Result<bool> {
        Err(Error::CacheCapability {
            capability: "tag invalidation",
            backend: self.name(),
        })
    }

    /// Evict expired entries, returning how many were removed.
    async fn prune(&self) -> Result<usize> {
        Err(Error::CacheCapability {
            capability: "pruning",
            backend: self.name(),
        })
    }
}

struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
    tags: Vec<String>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        !self.ttl.is_zero() && self.created_at.elapsed() > self.ttl
    }
}

struct MemoryState {
    entries: LruCache<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    fn unindex(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.unindex(key, &entry.tags);
                true
            }
            None => false,
        }
    }
}

/// In-process LRU cache with TTL expiry, tags and pruning.
///
/// Cloning yields another handle to the same storage, so several stores can share one
/// backend.
#[derive(Clone)]
pub struct MemoryCache {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                entries: LruCache::new(cap),
                tag_index: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| {
            Error::cache_with_context(
                format!("memory cache lock poisoned: {}", e),
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut state = self.lock()?;
        let expired = match state.entries.get(key.as_str()) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key.as_str());
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: &[u8],
        ttl: Duration,
        tags: &[String],
    ) -> Result<()> {
        let mut state = self.lock()?;
        state.remove(key.as_str());
        for tag in tags {
            state
                .tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.hash.clone());
        }
        let entry = CacheEntry {
            data: value.to_vec(),
            created_at: Instant::now(),
            ttl,
            tags: tags.to_vec(),
        };
        if let Some((evicted_key, evicted)) = state.entries.push(key.hash.clone(), entry) {
            state.unindex(&evicted_key, &evicted.tags);
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.remove(key.as_str()))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.entries.clear();
        state.tag_index.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            tags: true,
            prune: true,
        }
    }

    async fn invalidate_tags(&self, tags: &[String]) -> Result<bool> {
        let mut state = self.lock()?;
        for tag in tags {
            let keys = state.tag_index.remove(tag).unwrap_or_default();
            for key in keys {
                state.remove(&key);
            }
        }
        Ok(true)
    }

    async fn prune(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        Ok(expired.len())
    }
}

/// Backend that stores nothing. Advertises no optional capabilities.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration, _: &[String]) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
