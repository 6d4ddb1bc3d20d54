//! Error types used by the runvisor runtime and managed units.
//!
//! This module defines three error types:
//!
//! - [`UnitError`]: errors raised by individual units (resources, servers, loaders).
//! - [`RunError`]: errors raised by the [`Runner`](crate::Runner) while starting or stopping units.
//! - [`MultiError`]: index-aligned server failures surfaced when servers bring a run down.
//!
//! Both enums provide `as_label` for logs/metrics; [`RunError::is_canceled`] separates
//! graceful interruption from real faults.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::signals::Signal;

/// # Errors produced by units.
///
/// Returned by [`Resource`](crate::Resource), [`Server`](crate::Server) and
/// [`Configurable`](crate::Configurable) implementations, and by the [`Retrier`](crate::Retrier).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The operation failed.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation observed its token being cancelled and gave up.
    #[error("context cancelled")]
    Canceled,

    /// A retrier deadline expired before the unit started.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The overall timeout that was exceeded.
        timeout: Duration,
    },

    /// A retrier spent all of its attempts without a successful start.
    #[error("exhausted attempts ({attempts}): {error}")]
    ExhaustedAttempts {
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the last attempt.
        error: String,
    },

    /// `listen` was invoked on a server that is already listening.
    #[error("service already listening")]
    AlreadyListening,

    /// A unit operation panicked while running on a runtime-owned task.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl UnitError {
    /// Builds a [`UnitError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use runvisor::UnitError;
    ///
    /// let err = UnitError::fail("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        UnitError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UnitError::Fail { .. } => "unit_failed",
            UnitError::Canceled => "unit_canceled",
            UnitError::Timeout { .. } => "unit_timeout",
            UnitError::ExhaustedAttempts { .. } => "unit_exhausted_attempts",
            UnitError::AlreadyListening => "unit_already_listening",
            UnitError::Panicked { .. } => "unit_panicked",
        }
    }

    /// True for [`UnitError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, UnitError::Canceled)
    }
}

/// # Errors produced by the runner.
///
/// Startup errors (`NotStartable`, `Load`, `Start`, cancellation) are returned only after
/// everything the failed call started has been rolled back. `Stop` is returned by
/// [`Runner::finish`](crate::Runner::finish) and leaves the remaining units running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// A declared unit is neither a resource nor a server.
    #[error("unit {unit:?} is not startable")]
    NotStartable {
        /// Name of the offending unit.
        unit: String,
    },

    /// A configurable unit failed to load.
    #[error("unit {unit:?} failed to load: {source}")]
    Load {
        /// Name of the offending unit.
        unit: String,
        /// Error returned by `load`.
        source: UnitError,
    },

    /// A resource failed to start.
    #[error("unit {unit:?} failed to start: {source}")]
    Start {
        /// Name of the offending unit.
        unit: String,
        /// Error returned by `start`.
        source: UnitError,
    },

    /// A resource failed to stop; it and every unit started before it are still running.
    #[error("unit {unit:?} failed to stop: {source}")]
    Stop {
        /// Name of the offending unit.
        unit: String,
        /// Error returned by `stop`.
        source: UnitError,
    },

    /// The caller's token was cancelled (or `finish` interrupted the run).
    #[error("context cancelled")]
    Canceled,

    /// A shutdown signal arrived before any server was launched.
    #[error("start cancelled by signal {signal}")]
    Interrupted {
        /// The signal that was received.
        signal: Signal,
    },

    /// The signal source could not be subscribed.
    #[error("signal subscription failed: {0}")]
    Signal(#[source] std::io::Error),

    /// One or more servers failed while listening.
    #[error("{0}")]
    Servers(MultiError),
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use runvisor::RunError;
    ///
    /// assert_eq!(RunError::Canceled.as_label(), "run_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::NotStartable { .. } => "run_not_startable",
            RunError::Load { .. } => "run_load_failed",
            RunError::Start { .. } => "run_start_failed",
            RunError::Stop { .. } => "run_stop_failed",
            RunError::Canceled => "run_canceled",
            RunError::Interrupted { .. } => "run_interrupted",
            RunError::Signal(_) => "run_signal_failed",
            RunError::Servers(_) => "run_servers_failed",
        }
    }

    /// True when the run ended because of cancellation rather than a fault.
    ///
    /// Covers caller cancellation, signal interruption, and a unit that bailed out
    /// with [`UnitError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        match self {
            RunError::Canceled | RunError::Interrupted { .. } => true,
            RunError::Load { source, .. } | RunError::Start { source, .. } => source.is_canceled(),
            _ => false,
        }
    }

    /// Returns the per-server failures when servers brought the run down.
    pub fn servers(&self) -> Option<&MultiError> {
        match self {
            RunError::Servers(multi) => Some(multi),
            _ => None,
        }
    }
}

/// Index-aligned collection of server failures.
///
/// Entry `i` belongs to the `i`-th launched server; `None` means that server closed cleanly.
///
/// # Example
/// ```
/// use runvisor::{MultiError, UnitError};
///
/// let multi = MultiError::new(vec![None, Some(UnitError::fail("bind: address in use"))]);
/// assert_eq!(multi.to_string(), "ok, bind: address in use");
/// assert_eq!(multi.failures().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError(Vec<Option<UnitError>>);

impl MultiError {
    /// Wraps an index-aligned list of results.
    pub fn new(errors: Vec<Option<UnitError>>) -> Self {
        Self(errors)
    }

    /// Creates a list of `len` clean entries.
    pub(crate) fn with_len(len: usize) -> Self {
        Self(vec![None; len])
    }

    /// Records `err` at `idx`; out-of-range indices are ignored.
    pub(crate) fn set(&mut self, idx: usize, err: UnitError) {
        if let Some(slot) = self.0.get_mut(idx) {
            *slot = Some(err);
        }
    }

    /// Index-aligned entries.
    pub fn errors(&self) -> &[Option<UnitError>] {
        &self.0
    }

    /// Entry for the `idx`-th server.
    pub fn get(&self, idx: usize) -> Option<&UnitError> {
        self.0.get(idx).and_then(Option::as_ref)
    }

    /// Iterates `(index, error)` over failed servers only.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &UnitError)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(idx, e)| e.as_ref().map(|e| (idx, e)))
    }

    /// Number of entries (launched servers).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no server was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match entry {
                Some(err) => write!(f, "{err}")?,
                None => f.write_str("ok")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
