/// Exponential backoff schedule with a bounded attempt budget
use rand::Rng;
use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given duration, then make the next attempt
    RetryAfter(Duration),
    /// The attempt budget is spent; no further delay applies
    Exhausted,
}

/// Retry policy: `delay(attempt) = base_delay * 2^(attempt - 1)`.
///
/// Attempts are 1-indexed. After a failed attempt `n`, the caller asks
/// [`RetryPolicy::next`] whether to retry; `n == max_attempts` is exhausted.
/// The policy never sleeps itself.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    /// Add random jitter to backoff (±30%)
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1 (a single attempt, no retries).
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide what happens after attempt number `attempt` has failed.
    pub fn next(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }

        let delay = self.delay_for(attempt);
        if self.jitter {
            RetryDecision::RetryAfter(apply_jitter(delay))
        } else {
            RetryDecision::RetryAfter(delay)
        }
    }

    /// Backoff before the attempt following `attempt`, without jitter.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }
}

fn apply_jitter(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
    Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
}
