//! Bounded retry with linear backoff.
//!
//! Attempt `n` (1-based) waits `backoff_step * (n - 1)` before starting, so
//! the default policy sleeps 0s, 2s, 4s. Sleeps and attempts both yield to
//! the cancellation token.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(2000),
        }
    }
}

/// Result of a single attempt
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Done(T),
    /// Failed in a way worth retrying; carries the reason for logging
    Retry(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    Exhausted { attempts: u32, last_error: String },
    Cancelled,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Delay before the given 1-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt.saturating_sub(1)
    }

    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for n in 1..=max_attempts {
            let delay = self.delay_before(n);
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
            }
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let outcome = tokio::select! {
                outcome = attempt(n) => outcome,
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            };

            match outcome {
                AttemptOutcome::Done(value) => return Ok(value),
                AttemptOutcome::Retry(reason) => {
                    warn!("Attempt {}/{} failed: {}", n, max_attempts, reason);
                    last_error = reason;
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_succeeds_on_second_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = policy
            .run(&CancellationToken::new(), |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        AttemptOutcome::Retry("HTTP 503".to_string())
                    } else {
                        AttemptOutcome::Done(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result: Result<(), _> = policy
            .run(&CancellationToken::new(), |n| async move {
                AttemptOutcome::Retry(format!("failure {}", n))
            })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last_error: "failure 3".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let result: Result<(), _> = policy
            .run(&cancel, |_| {
                trigger.cancel();
                async { AttemptOutcome::Retry("timeout".to_string()) }
            })
            .await;

        assert_eq!(result, Err(RetryError::Cancelled));
    }
}
