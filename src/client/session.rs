use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Counters for one logical operation, shared by every request issued through a
/// client and its sub-request clones. Reset with [`RequestSession::reset`].
#[derive(Debug)]
pub struct RequestSession {
    total_requests: AtomicU64,
    live_requests: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
    suppressed_failures: AtomicU64,
    started_at: Mutex<Instant>,
}

/// A point-in-time copy of the session counters (facts only).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Every `run()` call.
    pub total_requests: u64,
    /// Runs that reached the transport.
    pub live_requests: u64,
    /// Prepares served from cache.
    pub cache_hits: u64,
    pub failures: u64,
    pub suppressed_failures: u64,
    pub elapsed_ms: u128,
}

impl Default for RequestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSession {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            live_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            suppressed_failures: AtomicU64::new(0),
            started_at: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_live(&self) {
        self.live_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, suppressed: bool) {
        if suppressed {
            self.suppressed_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let elapsed_ms = self
            .started_at
            .lock()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or_default();
        SessionSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            live_requests: self.live_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            suppressed_failures: self.suppressed_failures.load(Ordering::Relaxed),
            elapsed_ms,
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.live_requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.suppressed_failures.store(0, Ordering::Relaxed);
        if let Ok(mut started) = self.started_at.lock() {
            *started = Instant::now();
        }
    }
}
