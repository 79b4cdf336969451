//! Retry Policy: bounded re-invocation with exponential backoff
//!
//! The policy re-invokes a failing operation up to its budget, sleeping
//! `base_delay * 2^n` between attempts. It distinguishes no error kinds: an
//! `Err` and an `Ok(false)` are both "attempt failed". When the budget is
//! exhausted the failure is converted into a single [`DeadLetterRecord`]
//! routed to the injected sink, and the policy reports `succeeded = false`
//! rather than re-raising: retry exhaustion is an outcome, not an error.

use crate::dead_letter::{DeadLetterRecord, DeadLetterSink};
use crate::ResilienceError;
use rand::Rng;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

/// How a single attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Operation succeeded
    Success,
    /// Operation failed with budget remaining
    RetriableFailure,
    /// Operation failed on the final attempt
    TerminalFailure,
}

/// Per-attempt record, kept for reporting only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    /// Backoff slept before this attempt (zero for the first)
    pub delay_before: Duration,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
}

/// Result of running an operation under a retry policy
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// Whether any attempt succeeded
    pub succeeded: bool,
    /// One record per attempt made
    pub attempts: Vec<RetryAttempt>,
}

impl RetryOutcome {
    /// Number of attempts made
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Total backoff slept across all attempts
    pub fn total_backoff(&self) -> Duration {
        self.attempts.iter().map(|a| a.delay_before).sum()
    }
}

/// Bounded retry with exponential backoff and dead-letter routing.
///
/// Jitter is off by default so backoff timing stays deterministic; enabling
/// it adds a uniform `0..base_delay` extra to each sleep, de-synchronizing
/// concurrent callers retrying against the same dependency.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocation budget: 3 means at most 3 attempts
    pub max_retries: usize,
    /// Delay before the second attempt; doubles each attempt after
    pub base_delay: Duration,
    /// Add uniform random jitter to each backoff sleep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given budget and base delay, no jitter
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter: false,
        }
    }

    /// Run `op` under this policy.
    ///
    /// `op` receives the 1-based attempt number and reports failure either
    /// as `Err(_)` or as `Ok(false)`. On exhaustion, exactly one dead-letter
    /// record (tagged with `destination` and `item_key`) is published to
    /// `sink`; a sink publish failure is logged, never propagated.
    pub async fn run<F, Fut>(
        &self,
        destination: &str,
        item_key: &str,
        sink: &dyn DeadLetterSink,
        op: F,
    ) -> RetryOutcome
    where
        F: Fn(u32) -> Fut,
        Fut: std::future::Future<Output = Result<bool, ResilienceError>>,
    {
        let mut attempts = Vec::with_capacity(self.max_retries);
        let mut last_error = "operation reported failure".to_string();

        for attempt in 0..self.max_retries {
            let delay_before = if attempt == 0 {
                Duration::ZERO
            } else {
                let delay = self.backoff_delay(attempt - 1);
                tokio::time::sleep(delay).await;
                delay
            };

            let attempt_number = attempt as u32 + 1;
            debug!(
                destination,
                item_key, attempt_number, "attempting operation"
            );

            let failed_outcome = if attempt + 1 == self.max_retries {
                AttemptOutcome::TerminalFailure
            } else {
                AttemptOutcome::RetriableFailure
            };

            match op(attempt_number).await {
                Ok(true) => {
                    attempts.push(RetryAttempt {
                        attempt_number,
                        delay_before,
                        outcome: AttemptOutcome::Success,
                    });
                    debug!(destination, item_key, attempt_number, "operation succeeded");
                    return RetryOutcome {
                        succeeded: true,
                        attempts,
                    };
                }
                Ok(false) => {
                    warn!(
                        destination,
                        item_key, attempt_number, "operation reported failure"
                    );
                    attempts.push(RetryAttempt {
                        attempt_number,
                        delay_before,
                        outcome: failed_outcome,
                    });
                }
                Err(e) => {
                    warn!(
                        destination,
                        item_key,
                        attempt_number,
                        error = %e,
                        "operation failed"
                    );
                    last_error = e.to_string();
                    attempts.push(RetryAttempt {
                        attempt_number,
                        delay_before,
                        outcome: failed_outcome,
                    });
                }
            }
        }

        warn!(
            destination,
            item_key,
            attempts = self.max_retries,
            "retry budget exhausted, routing to dead letter"
        );

        let record = DeadLetterRecord {
            destination: destination.to_string(),
            item_key: item_key.to_string(),
            attempts: self.max_retries as u32,
            last_error,
            failed_at: SystemTime::now(),
        };
        if let Err(e) = sink.publish(record).await {
            error!(destination, item_key, error = %e, "failed to publish dead letter");
        }

        RetryOutcome {
            succeeded: false,
            attempts,
        }
    }

    /// Backoff slept after failed attempt `n` (0-based): `base_delay * 2^n`
    fn backoff_delay(&self, failed_attempt: usize) -> Duration {
        let exp = (failed_attempt as u32).min(20);
        let mut delay = self.base_delay.saturating_mul(1u32 << exp);
        if self.jitter {
            let base_ms = self.base_delay.as_millis() as u64;
            if base_ms > 0 {
                let extra = rand::rng().random_range(0..base_ms);
                delay += Duration::from_millis(extra);
            }
        }
        delay
    }
}
