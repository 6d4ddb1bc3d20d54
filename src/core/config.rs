//! # Runner configuration.
//!
//! Provides [`RunnerConfig`] centralized settings for a [`Runner`](crate::Runner).
//!
//! ## Sentinel values
//! - `signals = []` → falls back to [`DEFAULT_SIGNALS`]

use crate::signals::Signal;

/// Signals a runner listens to when none are configured.
pub const DEFAULT_SIGNALS: &[Signal] = &[Signal::Interrupt];

/// Configuration of a [`Runner`](crate::Runner).
///
/// ## Field semantics
/// - `signals`: OS signals that request shutdown, used when no explicit
///   [`SignalSource`](crate::SignalSource) is given to the builder
#[derive(Clone, Debug, Default)]
pub struct RunnerConfig {
    /// OS signals that trigger shutdown (`[]` = [`DEFAULT_SIGNALS`]).
    pub signals: Vec<Signal>,
}

impl RunnerConfig {
    /// Config listening to the given signals.
    pub fn with_signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
        }
    }

    /// Returns the effective signal list.
    #[inline]
    pub fn effective_signals(&self) -> &[Signal] {
        if self.signals.is_empty() {
            DEFAULT_SIGNALS
        } else {
            &self.signals
        }
    }
}
