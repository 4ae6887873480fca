//! Bounded retry with exponential backoff around a [`PartTransport`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::TransferError;
use crate::transport::PartTransport;

/// Retry policy for a single part.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per part, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied for each subsequent retry.
    pub backoff_factor: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Give up immediately on 4xx responses other than 408 and 429.
    pub fail_fast_on_client_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            fail_fast_on_client_error: false,
        }
    }
}

impl RetryConfig {
    /// Delay to wait before the given retry (1-based): 1s, 2s, 4s, ...
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    fn should_retry(&self, err: &TransferError) -> bool {
        match err {
            TransferError::Cancelled => false,
            e if self.fail_fast_on_client_error => !e.is_permanent_client_error(),
            _ => true,
        }
    }
}

/// Outcome of a part upload that did not produce an integrity tag.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The cancellation token fired; no further attempts were made.
    #[error("cancelled")]
    Cancelled,

    /// Every attempt failed (or a non-retryable error occurred).
    #[error("part upload failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransferError,
    },
}

/// Wraps a [`PartTransport`] with bounded retry and cancellation.
#[derive(Clone)]
pub struct RetryingPartUploader {
    transport: Arc<dyn PartTransport>,
    config: RetryConfig,
}

impl RetryingPartUploader {
    pub fn new(transport: Arc<dyn PartTransport>, config: RetryConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Uploads `body` to `destination`, returning its integrity tag.
    ///
    /// Backoff is applied before every attempt except the first. Cancellation
    /// interrupts both the backoff sleep and an in-flight transfer.
    pub async fn upload(
        &self,
        destination: &str,
        body: Bytes,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RetryError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if attempt > 1 {
                let delay = self.config.delay_for_retry(attempt - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(attempt, "in-flight part transfer cancelled");
                    return Err(RetryError::Cancelled);
                }
                r = self.transport.put_part(destination, body.clone(), content_type) => r,
            };

            let err = match result {
                Ok(tag) => return Ok(tag),
                Err(e) => e,
            };

            if !self.config.should_retry(&err) {
                error!(attempt, error = %err, "part upload failed, not retryable");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            if attempt >= max_attempts {
                error!(attempts = attempt, error = %err, "part upload retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let next_delay = self.config.delay_for_retry(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = next_delay.as_millis() as u64,
                error = %err,
                "part attempt failed, backing off"
            );
        }
    }
}
