//! Bounded retry with exponential backoff for backend calls.
//!
//! The policy is generic over the error type: whether an error is worth
//! retrying is decided by the error itself via [`Transience`], so the policy
//! never needs to know about HTTP status codes or process exit states.

use crate::error::LlmError;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as transient (retry) or not (fail immediately).
pub trait Transience {
    fn is_transient(&self) -> bool;
}

impl Transience for LlmError {
    /// Only [`LlmError::Transient`] is retried. Configuration and permanent
    /// errors fail on first occurrence; an open circuit is never retried
    /// because the breaker already rejected the call.
    fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient { .. })
    }
}

/// Bounded retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait_min: Duration, wait_max: Duration) -> Self {
        Self {
            // Zero attempts would mean never calling the operation at all.
            max_attempts: max_attempts.max(1),
            wait_min,
            wait_max,
        }
    }

    /// Backoff before retry number `attempt` (1-based): `wait_min * 2^(attempt-1)`,
    /// clamped to `[wait_min, wait_max]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.wait_min.saturating_mul(factor);
        delay.clamp(self.wait_min, self.wait_max)
    }

    /// Drive `op` to completion, retrying transient errors up to
    /// `max_attempts` total attempts.
    ///
    /// Non-transient errors are returned immediately; a transient error on
    /// the final attempt is returned as-is. The caller (the circuit breaker)
    /// sees only the final outcome.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> std::result::Result<T, E>
    where
        E: Transience + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retry.backing_off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_millis(1),
            Duration::from_millis(10),
        )
    }

    fn transient() -> LlmError {
        LlmError::Transient {
            message: "HTTP 503".into(),
            status_code: Some(503),
        }
    }

    fn permanent() -> LlmError {
        LlmError::Permanent {
            message: "HTTP 401".into(),
            status_code: Some(401),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(transient().is_transient());
        assert!(!permanent().is_transient());
        assert!(!LlmError::Configuration {
            backend: "chatgpt".into(),
            message: "missing key".into(),
        }
        .is_transient());
        assert!(!LlmError::CircuitOpen {
            backend: "chatgpt".into(),
        }
        .is_transient());
    }

    #[test]
    fn test_backoff_exponential_and_clamped() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
        );
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(6), Duration::from_millis(30_000));
        assert_eq!(policy.backoff(30), Duration::from_millis(30_000));
    }

    #[test]
    fn test_backoff_monotonically_non_decreasing() {
        let policy = RetryPolicy::new(8, Duration::from_millis(50), Duration::from_millis(800));
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            let delay = policy.backoff(attempt);
            assert!(delay >= previous);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(800));
            previous = delay;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_success_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, LlmError> = policy(3)
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok("epic") }
            })
            .await;
        assert_eq!(result.unwrap(), "epic");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_exhausts_transient_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, LlmError> = policy(3)
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(matches!(result, Err(LlmError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_permanent_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, LlmError> = policy(5)
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(permanent()) }
            })
            .await;
        assert!(matches!(result, Err(LlmError::Permanent { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<String, LlmError> = policy(3)
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(transient())
                    } else {
                        Ok("recovered".to_string())
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
