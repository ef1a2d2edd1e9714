//! Bounded retry with exponential backoff for transport operations
//!
//! Only errors for which [`TransportError::is_retryable`] holds are
//! retried; everything else fails immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::network::error::{TransportError, TransportResult};

/// How many times to try, and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Try once and give up
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based), doubling each time
    ///
    /// ```
    /// use std::time::Duration;
    /// use roomcast_lib::network::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for_retry(3), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for_retry(10), Duration::from_millis(2000));
    /// ```
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is used up
pub async fn retry_transport<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> TransportResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if attempt > 1 {
            debug!(operation = operation_name, attempt, "Retrying transport operation");
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for_retry(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transport operation failed: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Whether `err` should be retried under `policy` after `attempt` tries
pub fn should_retry(policy: &RetryPolicy, err: &TransportError, attempt: u32) -> bool {
    err.is_retryable() && attempt < policy.max_attempts.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_transport("connect", &fast_policy(3), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::Timeout(10))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: TransportResult<()> = retry_transport("connect", &fast_policy(2), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::ConnectionFailed("refused".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: TransportResult<()> = retry_transport("connect", &fast_policy(5), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::AuthenticationFailed)
        })
        .await;

        assert!(matches!(result, Err(TransportError::AuthenticationFailed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_should_retry() {
        let policy = fast_policy(3);
        assert!(should_retry(&policy, &TransportError::Timeout(1), 1));
        assert!(!should_retry(&policy, &TransportError::Timeout(1), 3));
        assert!(!should_retry(&policy, &TransportError::MissingTransmitKey, 1));
        assert!(!should_retry(&RetryPolicy::no_retry(), &TransportError::Timeout(1), 1));
    }
}
