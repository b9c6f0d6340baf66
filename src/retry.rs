//! Retry policy for transient API failures.
//!
//! Only errors flagged retryable are repeated, with a pure exponential backoff:
//! 1s before the first retry, then 2s, 4s, 8s, ... No jitter is applied.

use std::time::Duration;

/// Delay before the first retry.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the delay, then try again.
    Retry(Duration),
    /// Surface the error.
    GiveUp,
}

/// Exponential backoff policy.
///
/// # Examples
///
/// ```
/// use postmen::retry::{RetryDecision, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
///
/// // After the first failure of a call allowed 5 tries: wait 1s.
/// assert_eq!(policy.decide(true, 1, 5, true), RetryDecision::Retry(Duration::from_secs(1)));
/// // The fifth failure is final.
/// assert_eq!(policy.decide(true, 5, 5, true), RetryDecision::GiveUp);
/// // Non-retryable errors are never repeated.
/// assert_eq!(policy.decide(false, 1, 5, true), RetryDecision::GiveUp);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry; each later retry doubles it.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom first delay.
    pub fn new(initial_delay: Duration) -> Self {
        Self { initial_delay }
    }

    /// Decides whether to retry after a failure.
    ///
    /// # Arguments
    ///
    /// * `retryable` - The failed attempt's retryable flag
    /// * `failures` - Failed attempts so far, including this one (1-indexed)
    /// * `max_tries` - Total attempts allowed
    /// * `retry_enabled` - Whether retrying is enabled for this call
    pub fn decide(
        &self,
        retryable: bool,
        failures: u32,
        max_tries: u32,
        retry_enabled: bool,
    ) -> RetryDecision {
        if !retryable || !retry_enabled || failures >= max_tries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for_retry(failures))
    }

    /// Returns the delay before the given retry (1 = first retry).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(multiplier)
    }
}
