//! Cache store: policy layer over a [`CacheBackend`].

use super::backend::{BackendCapabilities, CacheBackend};
use super::item::CacheItem;
use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_lifetime: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_lifetime: super::item::lifetime::HOUR,
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deferred: u64,
    pub commits: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deferred: AtomicU64,
    commits: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Item-level cache facade.
///
/// Adds a default lifetime, an active tag set, a deferred-write queue flushed by
/// [`CacheStore::commit`] and probabilistic pruning on top of the raw backend. The
/// backend's capabilities are read once here; tag and prune calls against a backend
/// lacking them fail with [`Error::CacheCapability`].
pub struct CacheStore {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    capabilities: BackendCapabilities,
    lifetime: RwLock<Duration>,
    tags: RwLock<Vec<String>>,
    deferred: Mutex<Vec<CacheItem>>,
    stats: AtomicStats,
}

impl CacheStore {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        let capabilities = backend.capabilities();
        let lifetime = RwLock::new(config.default_lifetime);
        Self {
            config,
            backend,
            capabilities,
            lifetime,
            tags: RwLock::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
            stats: AtomicStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    /// Look up `key`. The returned item reports [`CacheItem::is_hit`].
    pub async fn get_item(&self, key: &CacheKey) -> Result<CacheItem> {
        if !self.config.enabled {
            return Ok(CacheItem::new(key.clone()));
        }
        let stored = self.storage_key(key);
        match self.backend.get(&stored).await {
            Ok(Some(data)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(CacheItem::hit(key.clone(), data))
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(CacheItem::new(key.clone()))
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Persist `item` immediately.
    pub async fn save(&self, item: CacheItem) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let item = self.with_defaults(item)?;
        self.write(&item).await
    }

    /// Queue `item` for the next [`commit`](Self::commit). No backend round-trip.
    pub fn save_deferred(&self, item: CacheItem) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let item = self.with_defaults(item)?;
        self.lock_deferred()?.push(item);
        self.stats.deferred.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Flush the deferred queue. Returns `true` only if every queued write landed.
    pub async fn commit(&self) -> Result<bool> {
        let pending = std::mem::take(&mut *self.lock_deferred()?);
        if pending.is_empty() {
            return Ok(true);
        }
        let total = pending.len();
        let mut ok = true;
        for item in &pending {
            match self.write(item).await {
                Ok(written) => ok &= written,
                Err(e) => {
                    warn!(cache_key = %item.key(), error = %e, "deferred cache write failed");
                    ok = false;
                }
            }
        }
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        debug!(items = total, all_written = ok, "cache commit flushed");
        Ok(ok)
    }

    /// Number of writes waiting for [`commit`](Self::commit).
    pub fn pending_writes(&self) -> usize {
        self.lock_deferred().map(|q| q.len()).unwrap_or(0)
    }

    pub fn set_lifetime(&self, lifetime: Duration) -> Result<()> {
        *self.lifetime.write().map_err(|e| poisoned("lifetime", e))? = lifetime;
        Ok(())
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
            .read()
            .map(|l| *l)
            .unwrap_or(self.config.default_lifetime)
    }

    /// Replace the active tag set applied to subsequent saves.
    pub fn set_tags<I, S>(&self, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.capabilities.tags {
            return Err(Error::CacheCapability {
                capability: "tags",
                backend: self.backend.name(),
            });
        }
        *self.tags.write().map_err(|e| poisoned("tags", e))? =
            tags.into_iter().map(Into::into).collect();
        Ok(())
    }

    pub async fn invalidate_tags(&self, tags: &[String]) -> Result<bool> {
        if !self.capabilities.tags {
            return Err(Error::CacheCapability {
                capability: "tag invalidation",
                backend: self.backend.name(),
            });
        }
        let invalidated = self.backend.invalidate_tags(tags).await?;
        info!(tags = ?tags, "cache tags invalidated");
        Ok(invalidated)
    }

    /// Run a prune with probability `probability` (in `(0, 1]`).
    ///
    /// Returns whether the prune actually ran.
    pub async fn prune(&self, probability: f64) -> Result<bool> {
        if !self.capabilities.prune {
            return Err(Error::CacheCapability {
                capability: "pruning",
                backend: self.backend.name(),
            });
        }
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(Error::configuration_with_context(
                format!("prune probability must be in (0, 1], got {}", probability),
                ErrorContext::new()
                    .with_field_path("prune.probability")
                    .with_source("cache_store"),
            ));
        }
        if rand::random::<f64>() >= probability {
            return Ok(false);
        }
        let removed = self.backend.prune().await?;
        debug!(removed, "cache pruned");
        Ok(true)
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.backend.delete(&self.storage_key(key)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.lock_deferred()?.clear();
        self.backend.clear().await
    }

    fn with_defaults(&self, mut item: CacheItem) -> Result<CacheItem> {
        if item.lifetime().is_none() {
            item.expires_after(self.lifetime());
        }
        if item.tags().is_none() {
            let active = self.tags.read().map_err(|e| poisoned("tags", e))?;
            if !active.is_empty() {
                item.tag(active.iter().cloned());
            }
        }
        Ok(item)
    }

    async fn write(&self, item: &CacheItem) -> Result<bool> {
        let Some(data) = item.get() else {
            return Ok(false);
        };
        if data.len() > self.config.max_entry_size {
            debug!(cache_key = %item.key(), size = data.len(), "cache entry too large, skipped");
            return Ok(false);
        }
        let tags: Vec<String> = item
            .tags()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();
        let lifetime = item.lifetime().unwrap_or_else(|| self.lifetime());
        let stored = self.storage_key(item.key());
        match self.backend.set(&stored, data, lifetime, &tags).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn lock_deferred(&self) -> Result<MutexGuard<'_, Vec<CacheItem>>> {
        self.deferred.lock().map_err(|e| poisoned("deferred queue", e))
    }

    fn storage_key(&self, key: &CacheKey) -> CacheKey {
        if let Some(ref p) = self.config.key_prefix {
            key.with_prefix(p)
        } else {
            key.clone()
        }
    }
}

fn poisoned(what: &str, e: impl std::fmt::Display) -> Error {
    Error::cache_with_context(
        format!("{} lock poisoned: {}", what, e),
        ErrorContext::new().with_source("cache_store"),
    )
}
