// src/pipeline/retry.rs

//! Bounded retries for target-scoped work.
//!
//! Every attempt is logged with its index. Only the last error is surfaced.
//! Errors that are not retryable (see [`AppError::is_retryable`]) end the
//! loop immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{AttemptOutcome, AttemptRecord};

/// Attempt budget and pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            pause,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Terminal result of [`run_with_retry`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Failure { error: AppError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Failure { error, .. } => Err(error),
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `operation` receives the 1-based attempt number.
pub async fn run_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        let result = operation(attempt).await;
        let record = AttemptRecord {
            target: label.to_string(),
            attempt_number: attempt,
            outcome: if result.is_ok() {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failure
            },
            error: result.as_ref().err().map(ToString::to_string),
        };
        log_attempt(&record, max_attempts);

        match result {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) => {
                if !error.is_retryable() || attempt >= max_attempts {
                    return RetryOutcome::Failure {
                        error,
                        attempts: attempt,
                    };
                }
                if !policy.pause.is_zero() {
                    tokio::time::sleep(policy.pause).await;
                }
                attempt += 1;
            }
        }
    }
}

fn log_attempt(record: &AttemptRecord, max_attempts: u32) {
    match (&record.outcome, &record.error) {
        (AttemptOutcome::Failure, Some(error)) => log::warn!(
            "Attempt {}/{} failed for {}: {}",
            record.attempt_number,
            max_attempts,
            record.target,
            error
        ),
        _ => log::debug!(
            "Attempt {}/{} succeeded for {}",
            record.attempt_number,
            max_attempts,
            record.target
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    /// Fails with a render error until `fail_times` attempts have been made.
    async fn flaky(calls: &AtomicU32, fail_times: u32) -> Result<&'static str, AppError> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= fail_times {
            Err(AppError::render("store-1", format!("attempt {} failed", n)))
        } else {
            Ok("done")
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = run_with_retry(&policy(3), "store-1", |_| flaky(&calls, 2)).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget_and_keeps_last_error() {
        let calls = AtomicU32::new(0);
        let outcome = run_with_retry(&policy(2), "store-1", |_| flaky(&calls, 2)).await;

        match outcome {
            RetryOutcome::Failure { error, attempts } => {
                assert_eq!(attempts, 2);
                assert!(error.to_string().contains("attempt 2 failed"));
            }
            RetryOutcome::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = run_with_retry(&policy(5), "store-1", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::provider("gone")) }
        })
        .await;

        assert!(!outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let mut seen = Vec::new();
        let _ = run_with_retry(&policy(3), "store-1", |attempt| {
            seen.push(attempt);
            async move {
                if attempt < 3 {
                    Err(AppError::fetch("u", "nope"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
