use super::{RawResponse, Transport, TransportError, TransportRequest};
use crate::client::policy::{Decision, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Wraps another transport and replays transient failures with exponential backoff.
///
/// Once attempts are exhausted the last outcome is returned unchanged, so the caller
/// classifies the final status (or transport error) exactly as for a single call.
pub struct RetryingTransport {
    inner: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Transport for RetryingTransport {
    async fn send(&self, request: &TransportRequest) -> Result<RawResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.inner.send(request).await;
            match self.policy.decide(&outcome, attempt) {
                Decision::Done => {
                    if attempt > 0 {
                        info!(
                            uri = %request.url,
                            attempts = attempt + 1,
                            succeeded = outcome.as_ref().map(|r| r.status < 400).unwrap_or(false),
                            "retrying transport finished"
                        );
                    }
                    return outcome;
                }
                Decision::Retry { delay } => {
                    match &outcome {
                        Ok(resp) => warn!(
                            uri = %request.url,
                            attempt = attempt + 1,
                            http_status = resp.status,
                            delay_ms = delay.as_millis() as u64,
                            "transient HTTP status, retrying"
                        ),
                        Err(e) => warn!(
                            uri = %request.url,
                            attempt = attempt + 1,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "transport failure, retrying"
                        ),
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "retrying"
    }
}
