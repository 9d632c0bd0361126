//! One logical response, whether it came from the wire or from the cache.

use super::error_classification::{classify_status, error_for_status, Outcome};
use crate::cache::{CacheItem, CacheKey};
use crate::transport::{Headers, RawResponse, TransportRequest};
use crate::{Error, ErrorContext, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;

#[derive(Debug)]
enum State {
    /// Live call prepared but not executed yet.
    Scheduled(TransportRequest),
    Completed(RawResponse),
}

/// Uniform read interface over a live response or a cache reconstruction.
///
/// Origin-specific behavior is expressed with flags (`hit`, `suppress_errors`) instead
/// of wrapper types, so callers never branch on where the data came from.
#[derive(Debug)]
pub struct ResponseEnvelope {
    method: Method,
    uri: String,
    key: CacheKey,
    state: State,
    hit: bool,
    cache_handle: Option<CacheItem>,
    suppress_errors: bool,
    failed: bool,
    expected_status: u16,
    decoder: Option<String>,
}

impl ResponseEnvelope {
    pub(crate) fn scheduled(request: TransportRequest, key: CacheKey, expected_status: u16) -> Self {
        Self {
            method: request.method.clone(),
            uri: request.url.to_string(),
            key,
            state: State::Scheduled(request),
            hit: false,
            cache_handle: None,
            suppress_errors: false,
            failed: false,
            expected_status,
            decoder: None,
        }
    }

    /// Rebuild an envelope purely from cached fields.
    pub(crate) fn from_cache(
        method: Method,
        uri: String,
        key: CacheKey,
        response: RawResponse,
        expected_status: u16,
    ) -> Self {
        Self {
            method,
            uri,
            key,
            state: State::Completed(response),
            hit: true,
            cache_handle: None,
            suppress_errors: false,
            failed: false,
            expected_status,
            decoder: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn set_hit(&mut self, hit: bool) {
        self.hit = hit;
    }

    /// True iff a cache-write handle is attached.
    pub fn is_cacheable(&self) -> bool {
        self.cache_handle.is_some()
    }

    pub fn set_cache_handle(&mut self, handle: CacheItem) {
        self.cache_handle = Some(handle);
    }

    /// Detach the cache-write handle, releasing it from the envelope.
    pub fn unset_cache_handle(&mut self) -> Option<CacheItem> {
        self.cache_handle.take()
    }

    pub fn suppresses_errors(&self) -> bool {
        self.suppress_errors
    }

    pub fn set_suppress_errors(&mut self, suppress: bool) {
        self.suppress_errors = suppress;
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    pub(crate) fn set_decoder(&mut self, decoder: Option<String>) {
        self.decoder = decoder;
    }

    pub fn decoder(&self) -> Option<&str> {
        self.decoder.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Completed(_))
    }

    /// Age in seconds of a cache hit: the cached `age` header, else 0. `None` for live responses.
    pub fn age(&self) -> Option<u64> {
        if !self.hit {
            return None;
        }
        Some(
            self.raw()
                .ok()
                .and_then(|r| r.header("age"))
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0),
        )
    }

    /// Status code. Never raises for HTTP-level failures.
    pub fn status(&self) -> Result<u16> {
        Ok(self.raw()?.status)
    }

    /// True when completed with the expected status.
    pub fn is_success(&self) -> bool {
        !self.failed
            && matches!(&self.state, State::Completed(r) if classify_status(r.status, self.expected_status) == Outcome::Success)
    }

    /// True when a run completed with a failure that was suppressed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn headers(&self) -> Result<&Headers> {
        Ok(&self.checked()?.headers)
    }

    pub fn header(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.checked()?.header(name))
    }

    pub fn body(&self) -> Result<&[u8]> {
        Ok(&self.checked()?.body)
    }

    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.body()?).into_owned())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.body()?)?)
    }

    pub(crate) fn scheduled_request(&self) -> Option<TransportRequest> {
        match &self.state {
            State::Scheduled(req) => Some(req.clone()),
            State::Completed(_) => None,
        }
    }

    pub(crate) fn complete(&mut self, response: RawResponse) {
        self.state = State::Completed(response);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub(crate) fn raw(&self) -> Result<&RawResponse> {
        match &self.state {
            State::Completed(r) => Ok(r),
            State::Scheduled(_) => Err(Error::runtime_with_context(
                "response has not been executed",
                ErrorContext::new()
                    .with_details(self.uri.clone())
                    .with_source("response_envelope"),
            )),
        }
    }

    /// Completed response, or the classified HTTP error unless suppression is on.
    fn checked(&self) -> Result<&RawResponse> {
        let raw = self.raw()?;
        if self.suppress_errors {
            return Ok(raw);
        }
        match error_for_status(raw.status, self.expected_status, &self.uri, &raw.body) {
            Some(err) => Err(err),
            None => Ok(raw),
        }
    }
}
