//! Bounded retry with per-call timeout and exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use sitegraph_shared::{Result, SiteGraphError, TaggerConfig};

/// How tagging calls are bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Upper bound on a single call.
    pub timeout: Duration,
    /// Sleep before the second attempt; doubled after each further failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&TaggerConfig> for RetryPolicy {
    fn from(config: &TaggerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            timeout: config.timeout,
            initial_backoff: config.initial_backoff,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Timeouts and transient errors ([`SiteGraphError::is_transient`]) are
    /// retried; any other error is returned immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let err = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => SiteGraphError::Tagging(format!(
                    "{what}: timed out after {}ms",
                    self.timeout.as_millis()
                )),
            };

            if attempt >= attempts {
                return Err(err);
            }

            warn!(what, attempt, error = %err, backoff_ms = backoff.as_millis(), "retrying");
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            timeout: Duration::from_millis(timeout_ms),
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy(2, 20)
            .run("slow", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy(5, 100)
            .run("bad", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SiteGraphError::validation("malformed request")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let value = policy(0, 100).run("once", || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
