use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// Retry schedule shared by every remote read.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a
/// pause of `base_delay * n` before the next attempt.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    retryable: fn(&AppError) -> bool,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(300))
    }
}

impl RetryPolicy {
    /// Policy retrying only aborted requests
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retryable: AppError::is_retryable,
        }
    }

    pub fn with_predicate(mut self, retryable: fn(&AppError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Pause after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    pub fn should_retry(&self, err: &AppError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable)(err)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempts are used up. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        err,
                        attempt,
                        self.max_attempts,
                        delay
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
    use std::cell::Cell;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(300));
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_retries_aborts_until_success() {
        let calls = Cell::new(0);
        let result = fast()
            .run("load", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(AppError::Aborted("aborted".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), AppError> = fast()
            .run("load", || {
                calls.set(calls.get() + 1);
                async { Err(AppError::Aborted("aborted".into())) }
            })
            .await;

        assert!(matches!(result, Err(AppError::Aborted(_))));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), AppError> = fast()
            .run("load", || {
                calls.set(calls.get() + 1);
                async { Err(AppError::Network("refused".into())) }
            })
            .await;

        assert!(matches!(result, Err(AppError::Network(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let calls = Cell::new(0);
        let policy = fast().with_predicate(|e| matches!(e, AppError::Network(_)));
        let _: Result<(), AppError> = policy
            .run("load", || {
                calls.set(calls.get() + 1);
                async { Err(AppError::Network("refused".into())) }
            })
            .await;
        assert_eq!(calls.get(), 3);
    }
}
