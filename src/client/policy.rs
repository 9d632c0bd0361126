use crate::transport::{RawResponse, TransportError};
use std::time::Duration;

/// Statuses treated as transient by default.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[423, 425, 429, 500, 502, 503, 504, 507, 510];

/// Decision for how to proceed after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Done,
}

/// Bounded exponential backoff policy.
///
/// `max_attempts` counts every attempt including the first one, so the default of 3
/// means one initial call and at most two retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            retry_on_status: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        // exponential backoff: initial * 2^attempt
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let base = self.initial_delay.saturating_mul(factor);
        retry_after.unwrap_or(base).min(self.max_delay)
    }

    /// Decide what to do after an attempt.
    ///
    /// `attempt` is 0-based (the first call is attempt 0).
    pub fn decide(
        &self,
        outcome: &Result<RawResponse, TransportError>,
        attempt: u32,
    ) -> Decision {
        if attempt + 1 >= self.max_attempts {
            return Decision::Done;
        }

        match outcome {
            Err(_) => Decision::Retry {
                delay: self.backoff_delay(attempt, None),
            },
            Ok(resp) if self.is_retryable_status(resp.status) => {
                let retry_after = resp
                    .header("retry-after")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Decision::Retry {
                    delay: self.backoff_delay(attempt, retry_after),
                }
            }
            Ok(_) => Decision::Done,
        }
    }
}
