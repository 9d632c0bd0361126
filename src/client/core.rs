use crate::batch::ConcurrentBatch;
use crate::cache::{CacheItem, CacheStore, CachedResponse, RequestIdentifier};
use crate::client::config::ClientConfig;
use crate::client::envelope::ResponseEnvelope;
use crate::client::error_classification::{classify_status, error_for_status, Outcome};
use crate::client::options::RequestOptions;
use crate::client::session::{RequestSession, SessionSnapshot};
use crate::pipeline::DecoderRegistry;
use crate::transport::{RequestBody, Transport, TransportRequest};
use crate::{BoxStream, Error, ErrorContext, Result};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

/// Cache-aware request orchestrator.
///
/// Requests go through two phases. [`prepare`](Self::prepare) merges options,
/// resolves the URI, derives the cache key and consults the cache without any
/// network I/O; [`run`](Self::run) executes whatever is still scheduled, classifies
/// the outcome and queues the cache write. Writes become visible to other
/// requests only after [`commit`](Self::commit).
///
/// Cloning is cheap: transport, cache, decoders and session counters are shared.
#[derive(Clone)]
pub struct FetchClient {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) base_uri: Option<Url>,
    pub(crate) defaults: RequestOptions,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Option<Arc<CacheStore>>,
    pub(crate) identifier: RequestIdentifier,
    pub(crate) decoders: Arc<DecoderRegistry>,
    pub(crate) session: Arc<RequestSession>,
    pub(crate) cacheable_methods: Vec<Method>,
    pub(crate) sub_request: bool,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_uri", &self.base_uri.as_ref().map(Url::as_str))
            .field("transport", &self.transport.name())
            .field("cache", &self.cache.as_ref().map(|c| c.backend_name()))
            .field("sub_request", &self.sub_request)
            .finish()
    }
}

impl FetchClient {
    /// Start building a client.
    pub fn builder() -> crate::client::builder::FetchClientBuilder {
        crate::client::builder::FetchClientBuilder::new()
    }

    /// Client with the given base URI and defaults for everything else.
    pub fn new(base_uri: &str) -> Result<Self> {
        Self::builder().base_uri(base_uri).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<CacheStore>> {
        self.cache.as_ref()
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    pub fn is_sub_request(&self) -> bool {
        self.sub_request
    }

    /// A clone for nested fetches: same transport, cache and session, but
    /// HTTP-level failures are suppressed unless a request opts back in.
    pub fn sub_request(&self) -> Self {
        let mut client = self.clone();
        client.sub_request = true;
        client
    }

    /// Counters for the current logical operation.
    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn reset_session(&self) {
        self.session.reset();
    }

    /// Build the envelope for one request. No network I/O happens here.
    ///
    /// On a cache hit the returned envelope is already completed and
    /// [`is_hit`](ResponseEnvelope::is_hit); otherwise it is scheduled and, when
    /// the request is cacheable, carries the write handle `run` will fill.
    pub async fn prepare(
        &self,
        method: Method,
        uri: &str,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope> {
        let options = options.merged_over(&self.defaults);
        let url = self.effective_url(uri, &options.query)?;
        let key = self.identifier.identify(&method, &url, options.body.as_ref());
        let expected_status = options
            .expected_status
            .unwrap_or(self.config.expected_status);
        let suppress = options.suppress_errors.unwrap_or(self.sub_request);

        let cache = self
            .cache
            .as_ref()
            .filter(|store| store.is_enabled())
            .filter(|_| options.cache != Some(false))
            .filter(|_| self.cacheable_methods.contains(&method));

        let mut handle = None;
        if let Some(store) = cache {
            match store.get_item(&key).await {
                Ok(item) => match item.cached_response() {
                    Some(cached) if item.is_hit() => {
                        debug!(method = %method, uri = %url, cache_key = %key, "cache hit");
                        self.session.record_hit();
                        let mut envelope = ResponseEnvelope::from_cache(
                            method,
                            url.to_string(),
                            key,
                            cached.into_raw(),
                            expected_status,
                        );
                        envelope.set_suppress_errors(suppress);
                        envelope.set_decoder(options.decoder);
                        return Ok(envelope);
                    }
                    _ => {
                        debug!(method = %method, uri = %url, cache_key = %key, "cache miss");
                        handle = Some(CacheItem::new(key.clone()));
                    }
                },
                Err(e) => {
                    warn!(cache_key = %key, error = %e, "cache lookup failed; treating as miss");
                    handle = Some(CacheItem::new(key.clone()));
                }
            }
        }

        let mut request = TransportRequest::new(method, url);
        request.headers = options.headers;
        request.body = options.body;
        request.timeout = options.timeout;
        request.extensions = options.extra;
        request.correlation_id = Some(key.to_string());

        let mut envelope = ResponseEnvelope::scheduled(request, key, expected_status);
        if let Some(item) = handle {
            envelope.set_cache_handle(item);
        }
        envelope.set_suppress_errors(suppress);
        envelope.set_decoder(options.decoder);
        Ok(envelope)
    }

    /// Execute a prepared envelope.
    ///
    /// Cache hits and already-completed envelopes are returned untouched. A live
    /// success is queued for the deferred cache write. HTTP failures raise unless
    /// the envelope suppresses errors; transport failures always raise.
    pub async fn run(&self, mut envelope: ResponseEnvelope) -> Result<ResponseEnvelope> {
        self.session.record_request();
        let request = match envelope.scheduled_request() {
            Some(request) if !envelope.is_hit() => request,
            _ => return Ok(envelope),
        };

        let start = Instant::now();
        let sent = self.transport.send(&request).await;
        self.session.record_live();
        let duration_ms = start.elapsed().as_millis() as u64;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    method = %request.method,
                    uri = %request.url,
                    cache_key = %envelope.cache_key(),
                    duration_ms,
                    error = %e,
                    "transport failure"
                );
                self.session.record_failure(false);
                return Err(Error::transport(request.url.as_str(), e));
            }
        };

        let status = response.status;
        let expected = envelope.expected_status();
        if classify_status(status, expected) != Outcome::Success {
            if envelope.suppresses_errors() {
                info!(
                    method = %request.method,
                    uri = %request.url,
                    http_status = status,
                    duration_ms,
                    "request failed (suppressed)"
                );
                self.session.record_failure(true);
                envelope.unset_cache_handle();
                envelope.complete(response);
                envelope.mark_failed();
                return Ok(envelope);
            }
            self.session.record_failure(false);
            let err = error_for_status(status, expected, request.url.as_str(), &response.body);
            return Err(err.unwrap_or_else(|| {
                Error::runtime_with_context(
                    format!("unclassified status {}", status),
                    ErrorContext::new().with_source("fetch_client"),
                )
            }));
        }

        if let Some(mut item) = envelope.unset_cache_handle() {
            if let Some(store) = &self.cache {
                item.set(CachedResponse::from(&response).to_bytes()?);
                store.save_deferred(item)?;
            }
        }
        envelope.complete(response);
        envelope.set_hit(false);

        info!(
            method = %request.method,
            uri = %request.url,
            cache_key = %envelope.cache_key(),
            http_status = status,
            duration_ms,
            "request completed"
        );
        Ok(envelope)
    }

    /// Prepare, run on a miss, then flush the cache queue.
    pub async fn fetch(
        &self,
        method: Method,
        uri: &str,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope> {
        let envelope = self.prepare(method, uri, options).await?;
        let envelope = self.run(envelope).await?;
        if let Err(e) = self.commit().await {
            warn!(uri = %envelope.uri(), error = %e, "cache commit failed");
        }
        Ok(envelope)
    }

    pub async fn get(&self, uri: &str) -> Result<ResponseEnvelope> {
        self.fetch(Method::GET, uri, RequestOptions::new()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<ResponseEnvelope> {
        self.fetch(Method::POST, uri, options.with_body(RequestBody::Json(body)))
            .await
    }

    /// Decode a completed envelope's body.
    ///
    /// Decoder order: `decoder` > the request's decoder > the client default >
    /// `Content-Type` > URI extension.
    pub fn decode(&self, envelope: &ResponseEnvelope, decoder: Option<&str>) -> Result<Value> {
        let body = envelope.body()?;
        let content_type = envelope.header("content-type")?;
        let resolved = self.decoders.resolve(
            decoder.or(envelope.decoder()),
            self.config.default_decoder.as_deref(),
            content_type,
            envelope.uri(),
        )?;
        Ok(resolved.decode(body)?)
    }

    /// GET and decode in one step.
    pub async fn fetch_value(&self, uri: &str, options: RequestOptions) -> Result<Value> {
        let envelope = self.fetch(Method::GET, uri, options).await?;
        self.decode(&envelope, None)
    }

    /// Fetch many URIs concurrently with GET, yielding in input order.
    pub fn run_many<'a, I, S>(&'a self, uris: I, options: RequestOptions) -> BoxStream<'a, ResponseEnvelope>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConcurrentBatch::new(self).run_many(uris, options)
    }

    /// Flush deferred cache writes.
    pub async fn commit(&self) -> Result<bool> {
        match &self.cache {
            Some(store) => store.commit().await,
            None => Ok(true),
        }
    }

    fn effective_url(&self, uri: &str, query: &BTreeMap<String, String>) -> Result<Url> {
        let mut url = match Url::parse(uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_uri.as_ref().ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("relative URI '{}' requires a base_uri", uri),
                        ErrorContext::new().with_field_path("base_uri"),
                    )
                })?;
                base.join(uri).map_err(|e| invalid_uri(uri, e))?
            }
            Err(e) => return Err(invalid_uri(uri, e)),
        };

        let merged = merge_query(url.query(), query);
        url.set_query(merged.as_deref());
        Ok(url)
    }
}

/// Merge a raw query string with option parameters.
///
/// URI segments are kept verbatim (repeated keys and bare `key` without `=`
/// included) unless an option overrides their key. The result is stably sorted
/// by decoded key, so parameter order never changes the cache key while values
/// of a repeated key keep their relative order.
fn merge_query(raw: Option<&str>, overrides: &BTreeMap<String, String>) -> Option<String> {
    let mut segments: Vec<(String, String)> = raw
        .unwrap_or_default()
        .split('&')
        .filter_map(|segment| {
            let (key, _) = form_urlencoded::parse(segment.as_bytes()).next()?;
            if overrides.contains_key(&*key) {
                return None;
            }
            Some((key.into_owned(), segment.to_string()))
        })
        .collect();
    segments.extend(overrides.iter().map(|(k, v)| {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair(k, v)
            .finish();
        (k.clone(), encoded)
    }));
    if segments.is_empty() {
        return None;
    }
    segments.sort_by(|a, b| a.0.cmp(&b.0));
    Some(
        segments
            .into_iter()
            .map(|(_, segment)| segment)
            .collect::<Vec<_>>()
            .join("&"),
    )
}

fn invalid_uri(uri: &str, e: url::ParseError) -> Error {
    Error::configuration_with_context(
        format!("invalid URI '{}': {}", uri, e),
        ErrorContext::new().with_source("fetch_client"),
    )
}
