//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] randomizes backoff delays so that many processes restarting
//! together do not hammer a shared dependency in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[base, prev × 3]`, capped at max

use std::time::Duration;

use rand::Rng;

/// Randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact backoff delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`.
    Equal,
    /// Random delay in `[base, prev × 3]`, capped at max.
    ///
    /// Needs context, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => random_ms(0, millis(delay)),
            JitterPolicy::Equal => {
                let half = millis(delay) / 2;
                Duration::from_millis(half) + random_ms(0, half)
            }
        }
    }

    /// Applies decorrelated jitter given the floor (`base`), previous delay and cap.
    ///
    /// Other policies fall back to `apply(prev)`.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }
        let floor = millis(base);
        let upper = millis(prev).saturating_mul(3).min(millis(max)).max(floor);
        if floor >= upper {
            return base;
        }
        random_ms(floor, upper)
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Uniform random delay in `[lo, hi]` milliseconds.
fn random_ms(lo: u64, hi: u64) -> Duration {
    if hi <= lo {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}
