//! # Backoff policy between start attempts.
//!
//! [`BackoffPolicy`] controls how the delay between a [`Retrier`](crate::Retrier)'s
//! attempts grows after repeated failures. It is parameterized by:
//! - [`BackoffPolicy::first`] the delay after the first failure;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the cap.
//!
//! The delay after failed attempt `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jitter is applied. The base is derived from the attempt number only, so jitter
//! never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use runvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::exponential(
//!     Duration::from_millis(100),
//!     2.0,
//!     Duration::from_secs(10),
//! );
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! // 100ms × 2^10 = 102.4s → capped
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy between attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Maximum delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant, `> 1.0` = exponential).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms delay, capped at 30s, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_millis(100))
    }
}

impl BackoffPolicy {
    /// Same delay between every attempt.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay.max(Duration::from_secs(30)),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay multiplied by `factor` after each failure, up to `max`.
    pub fn exponential(first: Duration, factor: f64, max: Duration) -> Self {
        Self {
            first,
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns the policy with `jitter` applied.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay after failed attempt `attempt` (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
