use crate::{Error, ErrorContext, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Provider-level configuration.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```yaml
/// base_uri: https://api.example.com
/// default_headers:
///   accept: application/json
/// retry_enabled: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_uri: Option<String>,
    pub default_headers: BTreeMap<String, String>,
    pub default_query: BTreeMap<String, String>,
    pub default_lifetime_seconds: u64,
    pub cacheable_methods: Vec<String>,
    pub cache_enabled: bool,
    pub cache_tags: Vec<String>,
    pub key_prefix: Option<String>,
    pub retry_enabled: bool,
    /// Total attempts, including the first call.
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_redirects: usize,
    pub timeout_secs: u64,
    /// Millisecond timeout; takes precedence over `timeout_secs` when set.
    pub timeout_ms: Option<u64>,
    pub expected_status: u16,
    pub default_decoder: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            default_headers: BTreeMap::new(),
            default_query: BTreeMap::new(),
            default_lifetime_seconds: 3600,
            cacheable_methods: vec!["GET".to_string(), "HEAD".to_string()],
            cache_enabled: true,
            cache_tags: Vec::new(),
            key_prefix: None,
            retry_enabled: false,
            max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            max_redirects: 5,
            timeout_secs: 30,
            timeout_ms: None,
            expected_status: 200,
            default_decoder: None,
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid YAML configuration: {}", e),
                ErrorContext::new().with_source("client_config"),
            )
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid JSON configuration: {}", e),
                ErrorContext::new().with_source("client_config"),
            )
        })
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn default_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_lifetime_seconds)
    }

    /// Parsed cacheable methods. Unknown method names are a configuration error.
    pub fn cacheable_methods(&self) -> Result<Vec<Method>> {
        self.cacheable_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                    Error::configuration_with_context(
                        format!("unknown HTTP method '{}'", m),
                        ErrorContext::new()
                            .with_field_path("cacheable_methods")
                            .with_source("client_config"),
                    )
                })
            })
            .collect()
    }
}
