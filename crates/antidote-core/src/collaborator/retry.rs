//! Bounded retry with exponential backoff for collaborator calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CollaboratorError;
use crate::metrics::METRICS;
use crate::obs;

/// Retry limits for one collaborator call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub attempt_timeout_ms: u64,
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound on any single backoff delay (milliseconds).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 60_000,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), honouring a server
    /// supplied `retry_after` up to the cap.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let delay = Duration::from_millis(exp.min(self.backoff_max_ms));
        let cap = Duration::from_millis(self.backoff_max_ms);
        match retry_after {
            Some(hint) => delay.max(hint.min(cap)),
            None => delay,
        }
    }
}

/// Run `call` with a per-attempt timeout, retrying transient failures.
///
/// Returns [`CollaboratorError::Exhausted`] wrapping the last error once
/// the retry allowance is used up.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, CollaboratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let max_attempts = policy.max_retries.saturating_add(1);
    let timeout = Duration::from_millis(policy.attempt_timeout_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_elapsed) => CollaboratorError::Timeout,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= max_attempts {
            return Err(CollaboratorError::Exhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let retry_after = match &err {
            CollaboratorError::RateLimited { retry_after } => *retry_after,
            _ => None,
        };
        let delay = policy.backoff(attempt, retry_after);
        obs::emit_collaborator_retry(operation, attempt, delay, &err);
        METRICS.inc_collaborator_retries();
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempt_timeout_ms: 1_000,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1, None), Duration::from_millis(500));
        assert_eq!(p.backoff(2, None), Duration::from_millis(1000));
        assert_eq!(p.backoff(10, None), Duration::from_millis(8000));
        assert_eq!(
            p.backoff(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            p.backoff(1, Some(Duration::from_secs(60))),
            Duration::from_secs(8)
        );
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let out = with_retry(&fast(), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CollaboratorError::Transport("reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(out, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_wraps_last_error() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), _> = with_retry(&fast(), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::MalformedResponse("no json".into()))
        })
        .await;
        match out {
            Err(CollaboratorError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, CollaboratorError::MalformedResponse(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out() {
        let policy = RetryPolicy {
            attempt_timeout_ms: 10,
            max_retries: 0,
            ..fast()
        };
        let out: Result<(), _> = with_retry(&policy, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        match out {
            Err(CollaboratorError::Exhausted { last, .. }) => {
                assert_eq!(*last, CollaboratorError::Timeout)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
