//! # Lifecycle events emitted by the runner and the retrier.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: load/start/stop transitions of one unit (before and after)
//! - **Retry events**: attempts, scheduled delays, and give-ups of a [`Retrier`](crate::Retrier)
//! - **Runtime events**: shutdown signals and reporter failures
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit name,
//! attempt counters, backoff delays, and error messages.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events of one runner are delivered synchronously, so `seq` order equals delivery order.
//!
//! ## Example
//! ```rust
//! use runvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AfterStart)
//!     .with_unit("postgres")
//!     .with_error("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::AfterStart);
//! assert_eq!(ev.unit.as_deref(), Some("postgres"));
//! assert!(ev.is_failure());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::signals::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle events ===
    /// A configurable unit is about to load.
    ///
    /// Sets:
    /// - `unit`: unit name
    BeforeLoad,

    /// A configurable unit finished loading.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `error`: load error, if any
    AfterLoad,

    /// A unit is about to start (resource `start` or server `listen`).
    ///
    /// Sets:
    /// - `unit`: unit name
    BeforeStart,

    /// A resource start attempt returned.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `attempt`: attempt number (retrier only)
    /// - `error`: start error, if any
    AfterStart,

    /// A resource is about to stop.
    ///
    /// Sets:
    /// - `unit`: unit name
    BeforeStop,

    /// A resource stopped or a server was closed.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `error`: stop/close error, if any
    AfterStop,

    // === Retry events ===
    /// The retrier is about to run another attempt.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `attempt`: attempt number (1-based, always `> 1`)
    BeforeRetry,

    /// The retrier is sleeping before the next attempt.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `attempt`: attempt that just failed
    /// - `delay_ms`: delay before the next attempt (ms)
    /// - `error`: failure message
    RetryScheduled,

    /// The retrier stopped trying.
    ///
    /// Sets:
    /// - `unit`: unit name
    /// - `attempt`: attempts made so far
    /// - `error`: why it gave up (cancelled, timed out, exhausted)
    AfterGiveUp,

    // === Runtime events ===
    /// A shutdown signal was received by a running runner.
    ///
    /// Sets:
    /// - `signal`: received signal
    SignalReceived,

    /// A reporter panicked while handling an event; the event was skipped for it.
    ///
    /// Sets:
    /// - `unit`: reporter name
    /// - `error`: panic info
    ReporterPanicked,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::BeforeLoad => "before_load",
            EventKind::AfterLoad => "after_load",
            EventKind::BeforeStart => "before_start",
            EventKind::AfterStart => "after_start",
            EventKind::BeforeStop => "before_stop",
            EventKind::AfterStop => "after_stop",
            EventKind::BeforeRetry => "before_retry",
            EventKind::RetryScheduled => "retry_scheduled",
            EventKind::AfterGiveUp => "after_give_up",
            EventKind::SignalReceived => "signal_received",
            EventKind::ReporterPanicked => "reporter_panicked",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the unit, if applicable.
    pub unit: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Error message of the transition, if it failed.
    pub error: Option<Arc<str>>,
    /// Received signal.
    pub signal: Option<Signal>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            attempt: None,
            delay_ms: None,
            error: None,
            signal: None,
        }
    }

    /// Attaches a unit name.
    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an error message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches the error of `res`, if any.
    #[inline]
    pub fn with_result<E: std::fmt::Display>(self, res: &Result<(), E>) -> Self {
        match res {
            Ok(()) => self,
            Err(e) => self.with_error(e.to_string()),
        }
    }

    /// Attaches a received signal.
    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Creates a reporter panic event.
    #[inline]
    pub fn reporter_panicked(reporter: &'static str, info: String) -> Self {
        Event::new(EventKind::ReporterPanicked)
            .with_unit(reporter)
            .with_error(info)
    }

    /// True if the event carries an error.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Backoff delay as a [`Duration`], if set.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}
