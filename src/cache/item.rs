use super::key::CacheKey;
use crate::transport::{Headers, RawResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Named lifetimes for cache entries.
pub mod lifetime {
    use std::time::Duration;

    pub const MINUTE: Duration = Duration::from_secs(60);
    pub const HOUR: Duration = Duration::from_secs(3_600);
    pub const DAY: Duration = Duration::from_secs(86_400);
    pub const WEEK: Duration = Duration::from_secs(604_800);
    pub const MONTH: Duration = Duration::from_secs(2_678_400);
    pub const YEAR: Duration = Duration::from_secs(31_536_000);
}

/// Stored shape of a cached response.
///
/// All three fields are required: an entry missing any of them fails to
/// deserialize and is treated as a miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub http_code: u16,
    pub response_headers: Headers,
    pub body: String,
}

impl CachedResponse {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn into_raw(self) -> RawResponse {
        RawResponse::new(self.http_code, self.response_headers, self.body)
    }
}

impl From<&RawResponse> for CachedResponse {
    fn from(resp: &RawResponse) -> Self {
        Self {
            http_code: resp.status,
            response_headers: resp.headers.clone(),
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        }
    }
}

/// A keyed slot in the cache: either the result of a lookup or a value waiting
/// to be saved.
///
/// Lifetime and tags left unset here are filled in by the store when the item
/// is saved.
#[derive(Debug, Clone)]
pub struct CacheItem {
    key: CacheKey,
    value: Option<Vec<u8>>,
    hit: bool,
    lifetime: Option<Duration>,
    tags: Option<BTreeSet<String>>,
}

impl CacheItem {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            value: None,
            hit: false,
            lifetime: None,
            tags: None,
        }
    }

    pub(crate) fn hit(key: CacheKey, value: Vec<u8>) -> Self {
        Self {
            key,
            value: Some(value),
            hit: true,
            lifetime: None,
            tags: None,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn set(&mut self, value: impl Into<Vec<u8>>) -> &mut Self {
        self.value = Some(value.into());
        self
    }

    pub fn expires_after(&mut self, lifetime: Duration) -> &mut Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn tag<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .get_or_insert_with(BTreeSet::new)
            .extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        self.tags.as_ref()
    }

    /// Decoded response, if the slot holds a complete entry.
    pub fn cached_response(&self) -> Option<CachedResponse> {
        self.value.as_deref().and_then(CachedResponse::from_bytes)
    }
}
