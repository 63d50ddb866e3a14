use std::future::Future;
use std::time::Duration;

use edi_pipeline::Result;
use tracing::warn;

/// Exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(100),
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        Self::new(1)
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use edi_pipeline::Error;
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();
        let value = RetryPolicy::new(3)
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::unavailable("database is locked"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = RetryPolicy::new(2)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::internal("boom"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = RetryPolicy::new(3)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::conflict("duplicate interchange"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
