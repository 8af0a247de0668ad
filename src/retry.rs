//! One retry combinator used by every provider adapter (design doc §9:
//! "Ad-hoc retry loops sprinkled across modules... consolidate into one
//! retry combinator taking a policy"). Exponential backoff capped at
//! `cap_delay`, retrying only errors the caller's `retry_on` predicate
//! accepts.

use crate::error::{PipelineError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap_delay: Duration,
}

impl RetryPolicy {
    /// The §4.6 transcription default: up to 8 retries, backoff doubling
    /// from 1s, capped at 60s.
    pub fn transcription_default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_secs(1),
            cap_delay: Duration::from_secs(60),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Scale every delay in this policy by `multiplier`, used by the
    /// `retry --timeout-multiplier` CLI path without mutating `Config`.
    pub fn scaled(mut self, multiplier: f64) -> Self {
        self.base_delay = self.base_delay.mul_f64(multiplier.max(0.0));
        self.cap_delay = self.cap_delay.mul_f64(multiplier.max(0.0));
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(20));
        (self.base_delay * exp).min(self.cap_delay)
    }
}

/// Run `op` under `policy`, retrying only when `should_retry(&err)` returns
/// true. Returns the first success, or the last error once attempts are
/// exhausted or `should_retry` rejects it.
pub async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    mut should_retry: impl FnMut(&PipelineError) -> bool,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt - 1);
                warn!(
                    "attempt {attempt}/{} failed ({err}); retrying in {:?}",
                    policy.max_attempts, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Convenience wrapper matching §7's retry policy: retry only
/// `TransientProviderError`.
pub async fn retry_transient<T, F, Fut>(policy: RetryPolicy, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_policy(policy, |e| e.is_retryable(), op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            cap_delay: Duration::from_millis(5),
        };

        let result = retry_transient(policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PipelineError::TransientProvider("503".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            cap_delay: Duration::from_millis(5),
        };

        let result: Result<()> = retry_transient(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::PermanentProvider("400".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            cap_delay: Duration::from_millis(2),
        };

        let result: Result<()> = retry_transient(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::TransientProvider("503".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
