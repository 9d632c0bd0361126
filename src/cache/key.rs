//! Cache key generation.

use crate::transport::RequestBody;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::new(format!("{}:{}", prefix, self.hash))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derives stable cache keys from `(method, effective URI, body)`.
///
/// The URI is expected to already carry the merged, sorted query string (see
/// `FetchClient::prepare`), so two requests differing only in parameter order
/// share a key. GET and HEAD never include the body.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentifier {
    salt: Option<String>,
}

impl RequestIdentifier {
    pub fn new() -> Self {
        Self { salt: None }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn identify(&self, method: &Method, uri: &Url, body: Option<&RequestBody>) -> CacheKey {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("method", method.as_str().to_string());
        parts.insert("uri", uri.as_str().to_string());
        if carries_body(method) {
            if let Some(body) = body {
                parts.insert("body", body.canonical());
            }
        }
        if let Some(ref s) = self.salt {
            parts.insert("salt", s.clone());
        }
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(hash)
    }
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}
