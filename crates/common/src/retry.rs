use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Exponential backoff for startup dependencies: `base_delay * factor^(attempt - 1)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted, returning the last error.
pub async fn retry_with_backoff<T, E, F, Fut>(name: &str, policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = %name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                error!(
                    operation = %name,
                    attempts = attempt,
                    error = %e,
                    "giving up after exhausting retries"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    operation = %name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay_doubles() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(512_000));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(1000).saturating_mul(u32::MAX));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::from_millis(10));

        let result: Result<u32, String> = retry_with_backoff("flaky", &policy, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("failure {n}"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error_when_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<(), String> = retry_with_backoff("down", &policy, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("failure {n}"))
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
