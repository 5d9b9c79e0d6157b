//! Bounded retry with fixed per-attempt delays.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};

/// Delay used when an attempt has no configured delay.
const FALLBACK_DELAY_MS: u64 = 1500;

/// How many times to try a remote call and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay after the Nth failed attempt (1-based index into this list).
    pub delays_ms: Vec<u64>,
    /// Upper bound for a single attempt. Zero disables the timeout.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delays_ms: vec![FALLBACK_DELAY_MS],
            attempt_timeout_ms: 20_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delays_ms: &[u64]) -> Self {
        Self {
            attempts,
            delays_ms: delays_ms.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_attempt_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.attempt_timeout_ms = timeout_ms;
        self
    }

    /// Delay after failed attempt `attempt_no` (1-based).
    pub fn delay_after(&self, attempt_no: u32) -> Duration {
        let idx = attempt_no.saturating_sub(1) as usize;
        Duration::from_millis(self.delays_ms.get(idx).copied().unwrap_or(FALLBACK_DELAY_MS))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Every failure is logged at warn with the attempt number. The last error is
/// returned when all attempts fail. No delay follows the final attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    kind: &str,
    session_id: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let outcome = if policy.attempt_timeout_ms > 0 {
            let limit = Duration::from_millis(policy.attempt_timeout_ms);
            match tokio::time::timeout(limit, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(policy.attempt_timeout_ms)),
            }
        } else {
            op(attempt).await
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    kind = %kind,
                    session_id = %session_id,
                    attempt,
                    error = %e,
                    "Attempt failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other(format!("{} failed after retries", kind))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_first_success_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = run_with_retry(&RetryPolicy::new(3, &[1, 1]), "summary", "s1", |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_on_later_attempt() {
        let policy = RetryPolicy::new(3, &[1, 1]);
        let result = run_with_retry(&policy, "evaluation", "s1", |attempt| async move {
            if attempt < 3 {
                Err(Error::enrichment("boom"))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let policy = RetryPolicy::new(2, &[1]);
        let result: Result<()> = run_with_retry(&policy, "nudges", "s1", |attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::enrichment(format!("attempt {attempt}")))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.unwrap_err().to_string().contains("attempt 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_follow_policy() {
        let start = tokio::time::Instant::now();
        let _: Result<()> = run_with_retry(
            &RetryPolicy::new(3, &[1500, 3000, 6000]),
            "evaluation",
            "s1",
            |_| async { Err(Error::enrichment("down")) },
        )
        .await;
        // No sleep after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let policy = RetryPolicy::new(2, &[10]).with_attempt_timeout_ms(100);
        let result: Result<()> = run_with_retry(&policy, "summary", "s1", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(100))));
    }

    #[test]
    fn test_delay_after_falls_back() {
        let policy = RetryPolicy::new(3, &[900]);
        assert_eq!(policy.delay_after(1), Duration::from_millis(900));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1500));
    }
}
