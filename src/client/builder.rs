use crate::cache::{CacheBackend, CacheConfig, CacheStore, MemoryCache, RequestIdentifier};
use crate::client::config::ClientConfig;
use crate::client::core::FetchClient;
use crate::client::options::RequestOptions;
use crate::client::policy::RetryPolicy;
use crate::client::session::RequestSession;
use crate::pipeline::DecoderRegistry;
use crate::transport::{HttpTransport, RetryingTransport, Transport};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Entries kept by the default in-memory backend.
const DEFAULT_MEMORY_ENTRIES: usize = 1000;

/// Builder for [`FetchClient`].
///
/// Starts from [`ClientConfig::default`]; every setter overrides one field. Anything
/// not injected (transport, cache, decoders) is built from the config in
/// [`build`](Self::build).
pub struct FetchClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Option<RetryPolicy>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    cache_store: Option<Arc<CacheStore>>,
    decoders: Option<DecoderRegistry>,
    key_salt: Option<String>,
    sub_request: bool,
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            retry_policy: None,
            cache_backend: None,
            cache_store: None,
            decoders: None,
            key_salt: None,
            sub_request: false,
        }
    }

    /// Replace the whole configuration (e.g. one loaded from YAML).
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.base_uri = Some(uri.into());
        self
    }

    pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn default_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_query.insert(name.into(), value.into());
        self
    }

    /// Backend for the default [`CacheStore`]. Ignored when a store is injected.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Share an existing store (and its deferred queue) with this client.
    pub fn cache_store(mut self, store: Arc<CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn default_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.default_lifetime_seconds = lifetime.as_secs();
        self
    }

    pub fn cache_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cache_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = Some(prefix.into());
        self
    }

    /// Mix a salt into every cache key (e.g. a per-credential namespace).
    pub fn key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = Some(salt.into());
        self
    }

    pub fn cacheable_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cacheable_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn retry_enabled(mut self, enabled: bool) -> Self {
        self.config.retry_enabled = enabled;
        self
    }

    /// Custom retry policy. Implies `retry_enabled(true)`.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_enabled = true;
        self.retry_policy = Some(policy);
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.config.max_redirects = n;
        self
    }

    /// Whole-client timeout, kept at millisecond precision.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some((timeout.as_millis() as u64).max(1));
        self
    }

    pub fn expected_status(mut self, status: u16) -> Self {
        self.config.expected_status = status;
        self
    }

    /// Inject a transport instead of the reqwest-backed default.
    ///
    /// Retry wrapping still applies when retry is enabled.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn decoders(mut self, registry: DecoderRegistry) -> Self {
        self.decoders = Some(registry);
        self
    }

    pub fn default_decoder(mut self, name: impl Into<String>) -> Self {
        self.config.default_decoder = Some(name.into());
        self
    }

    /// Build a client that suppresses HTTP-level failures by default.
    pub fn sub_request(mut self, enabled: bool) -> Self {
        self.sub_request = enabled;
        self
    }

    pub fn build(self) -> Result<FetchClient> {
        let config = self.config;

        let base_uri = config.base_uri.as_deref().map(parse_base_uri).transpose()?;
        let cacheable_methods = config.cacheable_methods()?;

        let mut transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        if config.retry_enabled {
            let policy = self.retry_policy.unwrap_or_else(|| {
                RetryPolicy::new()
                    .with_max_attempts(config.max_retries)
                    .with_initial_delay(Duration::from_millis(config.retry_initial_delay_ms))
                    .with_max_delay(Duration::from_millis(config.retry_max_delay_ms))
            });
            transport = Arc::new(RetryingTransport::new(transport, policy));
        }

        let cache = match self.cache_store {
            Some(store) => store,
            None => {
                let backend = self
                    .cache_backend
                    .unwrap_or_else(|| {
                        Arc::new(MemoryCache::new(DEFAULT_MEMORY_ENTRIES)) as Arc<dyn CacheBackend>
                    });
                let mut cache_config = CacheConfig::new()
                    .with_lifetime(config.default_lifetime())
                    .with_enabled(config.cache_enabled);
                if let Some(prefix) = &config.key_prefix {
                    cache_config = cache_config.with_key_prefix(prefix.clone());
                }
                Arc::new(CacheStore::new(cache_config, backend))
            }
        };
        if !config.cache_tags.is_empty() {
            cache.set_tags(config.cache_tags.iter().cloned())?;
        }

        let mut defaults = RequestOptions::new();
        for (name, value) in &config.default_headers {
            defaults = defaults.with_header(name, value.clone());
        }
        for (name, value) in &config.default_query {
            defaults = defaults.with_query(name.clone(), value.clone());
        }

        let identifier = match self.key_salt {
            Some(salt) => RequestIdentifier::new().with_salt(salt),
            None => RequestIdentifier::new(),
        };

        debug!(
            base_uri = ?config.base_uri,
            transport = transport.name(),
            cache_backend = cache.backend_name(),
            retry_enabled = config.retry_enabled,
            "fetch client built"
        );

        Ok(FetchClient {
            config: Arc::new(config),
            base_uri,
            defaults,
            transport,
            cache: Some(cache),
            identifier,
            decoders: Arc::new(self.decoders.unwrap_or_default()),
            session: Arc::new(RequestSession::new()),
            cacheable_methods,
            sub_request: self.sub_request,
        })
    }
}

/// Parse the base URI, giving it a trailing slash so relative segments append
/// to its path instead of replacing the last segment.
fn parse_base_uri(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base_uri '{}': {}", raw, e),
            ErrorContext::new().with_field_path("base_uri"),
        )
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::configuration_with_context(
            format!("base_uri '{}' cannot be used as a base", raw),
            ErrorContext::new().with_field_path("base_uri"),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
