/*!
 * Retry policy for completion calls.
 *
 * After the n-th failed attempt the client sleeps `base * 2^n` plus a random
 * jitter in `[0, max_jitter)` before trying again. With the default one second
 * base this gives 2s, then 4s, each plus up to one second of jitter.
 */

use rand::Rng;
use std::time::Duration;

/// Retry configuration for one text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay multiplied by `2^attempt`
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Create a policy from an attempt count and a base delay in milliseconds.
    ///
    /// The jitter bound equals the base delay. At least one attempt is always made.
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(backoff_ms),
            max_jitter: Duration::from_millis(backoff_ms),
        }
    }

    /// A policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0)
    }

    /// Whether another attempt may follow the given (1-based) failed attempt
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Minimum delay after the given (1-based) failed attempt, without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay to sleep after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        self.base_delay_for(attempt) + jitter
    }
}
