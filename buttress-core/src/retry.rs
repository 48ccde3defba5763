//! Retry policy with jittered exponential backoff.

use crate::classify::Classification;
use std::time::{Duration, Instant};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first execution.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound applied to every computed delay, jitter included.
    pub max_delay: Duration,
    /// Growth factor between attempts (typically 2.0).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with the given attempt limit.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Set the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Backoff delay after the failure of `attempt` (1-indexed; the policy is
    /// only consulted once an attempt has failed).
    ///
    /// `min(base_delay * multiplier^(attempt-1), max_delay)`, scaled by a
    /// uniform jitter factor in [0.5, 1.5) so concurrent callers do not retry
    /// in lockstep, then capped at `max_delay` again.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.multiplier.powi(exponent as i32);
        let raw = self
            .base_delay
            .mul_f64(factor)
            .min(self.max_delay);
        let jitter = 0.5 + fastrand::f64();
        raw.mul_f64(jitter).min(self.max_delay)
    }

    /// Decide whether another attempt may be made after a failure.
    ///
    /// False once the classification is fatal, the attempt budget is spent,
    /// or the call deadline has elapsed. The circuit breaker is consulted
    /// separately at the top of every attempt.
    pub fn should_retry(
        &self,
        budget: &RetryBudget,
        classification: Classification,
        now: Instant,
    ) -> bool {
        classification == Classification::Retryable
            && !budget.exhausted()
            && !budget.deadline_elapsed(now)
    }
}

/// Per-invocation retry accounting.
///
/// Created when a call starts and discarded when it ends; never shared
/// between calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    attempts: u32,
    max_attempts: u32,
    started_at: Instant,
    deadline: Duration,
}

impl RetryBudget {
    /// Create a budget for one call invocation.
    pub fn new(max_attempts: u32, deadline: Duration, now: Instant) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
            started_at: now,
            deadline,
        }
    }

    /// Begin the next attempt, returning its 1-indexed number.
    pub fn start_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True once the attempt budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Time elapsed since the call started.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.started_at)
    }

    /// True once the overall call deadline has passed.
    pub fn deadline_elapsed(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.deadline
    }

    /// Time left before the call deadline.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_sub(self.elapsed(now))
    }
}
