//! Bounded exponential-backoff retry around backend calls
//!
//! Only failures tagged [`FailureKind::Transient`] are retried. The wait before
//! retry `n` (counted from 0) is `base_delay * 2^n`; at most `max_retries`
//! retries follow the first attempt.

use crate::backend::{BackendError, FailureKind};
use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Shorter responses count as transient failures
    pub min_response_chars: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2)).with_min_response_chars(10)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            min_response_chars: 0,
        }
    }

    pub fn with_min_response_chars(mut self, min: usize) -> Self {
        self.min_response_chars = min;
        self
    }

    /// Wait before retry `attempt`, counted from 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn check_length(&self, response: String) -> Result<String, BackendError> {
        let chars = response.trim().chars().count();
        if chars < self.min_response_chars {
            return Err(BackendError::EmptyResponse(format!(
                "response too short ({} chars)",
                chars
            )));
        }
        Ok(response)
    }
}

/// Outcome of [`call_with_retry`] with the attempt count.
#[derive(Debug, Clone)]
pub struct Attempted {
    pub outcome: Result<String, BackendError>,
    /// Calls made, including the first
    pub attempts: u32,
}

impl Attempted {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// After the last retry the final transient error is returned.
pub async fn call_with_retry<F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Attempted
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, BackendError>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let result = operation().await.and_then(|r| policy.check_length(r));
        let attempts = attempt + 1;

        let error = match result {
            Ok(response) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Succeeded after retry"
                    );
                }
                return Attempted {
                    outcome: Ok(response),
                    attempts,
                };
            }
            Err(e) => e,
        };

        if error.kind() == FailureKind::Permanent {
            tracing::error!(operation = operation_name, attempts, error = %error, "Permanent failure, not retrying");
            return Attempted {
                outcome: Err(error),
                attempts,
            };
        }

        if attempt >= policy.max_retries {
            tracing::error!(
                operation = operation_name,
                attempts,
                error = %error,
                "Retries exhausted"
            );
            return Attempted {
                outcome: Err(error),
                attempts,
            };
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            operation = operation_name,
            attempt = attempts,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
