//! Retry/backoff around single provider calls.
//!
//! Waits depend on the error category (`n` is the 0-based retry index):
//!
//! | kind                 | wait                      |
//! |----------------------|---------------------------|
//! | service unavailable  | `min(10s * 2^n, 120s)`    |
//! | rate limited         | `min(60s * 2^n, 300s)`    |
//! | empty response       | `15s + 10s * n`           |
//! | other transient      | `20s + 15s * n`           |
//!
//! Content-filtered and permanent errors are returned immediately.

use crate::rate::RateLimiter;
use crate::traits::{LlmError, LlmErrorKind, LlmResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Backoff before retry number `retry_index` (0-based), or `None` if `kind`
    /// is never retried.
    pub fn delay_for(&self, kind: LlmErrorKind, retry_index: u32) -> Option<Duration> {
        let n = retry_index.min(16);
        let secs = match kind {
            LlmErrorKind::ServiceUnavailable => (10u64 << n).min(120),
            LlmErrorKind::RateLimited => (60u64 << n).min(300),
            LlmErrorKind::EmptyResponse => 15 + 10 * u64::from(n),
            LlmErrorKind::Transient => 20 + 15 * u64::from(n),
            LlmErrorKind::ContentFiltered | LlmErrorKind::Permanent => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

/// Runs provider calls behind the shared [`RateLimiter`] with category backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Invoke `call` until it succeeds, fails permanently, or the retry budget
    /// is spent. At most `max_retries + 1` attempts are made and the limiter is
    /// awaited before each one.
    pub async fn execute<T, F, Fut>(&self, op: &str, mut call: F) -> LlmResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LlmResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.limiter.wait_if_needed().await;

            let err = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(op, attempt, "llm.retry.recovered");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let kind = err.kind();
            let Some(delay) = self.policy.delay_for(kind, attempt - 1) else {
                tracing::warn!(op, attempt, %kind, error = %err, "llm.retry.permanent");
                return Err(err);
            };

            if attempt > self.policy.max_retries {
                tracing::warn!(op, attempts = attempt, %kind, error = %err, "llm.retry.exhausted");
                return Err(LlmError::RetriesExhausted {
                    kind,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            tracing::warn!(
                op,
                attempt,
                max_retries = self.policy.max_retries,
                %kind,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "llm.retry.backing_off"
            );
            sleep(delay).await;
        }
    }
}
