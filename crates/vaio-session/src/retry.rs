//! Fixed-delay retry for backend writes.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;
use vaio_storage::ApiError;

/// How backend calls are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Set the attempt count. Zero is treated as one.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether another attempt follows a failed `attempt` (1-based).
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ApiError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}

/// Run `call` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !policy.should_retry(attempt, &e) {
                    return Err(e);
                }
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "backend call failed, retrying"
                );
                sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> ApiError {
        ApiError::Status {
            endpoint: "/api/user/session/grid".into(),
            status: 503,
            body: String::new(),
        }
    }

    fn rejected() -> ApiError {
        ApiError::Status {
            endpoint: "/api/user/session/grid".into(),
            status: 422,
            body: "bad layout".into(),
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_should_retry_limits() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1, &unavailable()));
        assert!(policy.should_retry(2, &unavailable()));
        assert!(!policy.should_retry(3, &unavailable()));
        assert!(!policy.should_retry(1, &rejected()));
        assert!(!RetryPolicy::none().should_retry(1, &unavailable()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let start = tokio::time::Instant::now();

        let result = with_retry(&RetryPolicy::default(), "update_grid", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok("saved")
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), "saved");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "update_grid", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(rejected()) }
        })
        .await;

        assert_eq!(result.map_err(|e| e.status()), Err(Some(422)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "update_modules", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
