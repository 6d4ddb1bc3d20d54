//! # LogWriter: tracing-backed reporter
//!
//! A reporter that turns every [`Event`] into a structured `tracing` record.
//! Successful transitions log at `debug`/`info`, failures at `warn`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  runvisor: starting unit="postgres"
//! WARN  runvisor: start failed unit="postgres" attempt=1 err="connection refused"
//! INFO  runvisor: retry scheduled unit="postgres" attempt=1 delay_ms=100
//! INFO  runvisor: started unit="postgres" attempt=2
//! INFO  runvisor: signal received signal=interrupt
//! INFO  runvisor: stopped unit="http"
//! ```

use crate::events::{Event, EventKind};
use crate::reporters::Report;

/// Event writer reporter.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Report for LogWriter {
    fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("-");
        let err = e.error.as_deref();

        match (e.kind, err) {
            (EventKind::BeforeLoad, _) => {
                tracing::debug!(target: "runvisor", unit, "loading");
            }
            (EventKind::AfterLoad, None) => {
                tracing::debug!(target: "runvisor", unit, "loaded");
            }
            (EventKind::AfterLoad, Some(err)) => {
                tracing::warn!(target: "runvisor", unit, err, "load failed");
            }
            (EventKind::BeforeStart, _) => {
                tracing::info!(target: "runvisor", unit, "starting");
            }
            (EventKind::AfterStart, None) => {
                tracing::info!(target: "runvisor", unit, attempt = ?e.attempt, "started");
            }
            (EventKind::AfterStart, Some(err)) => {
                tracing::warn!(target: "runvisor", unit, attempt = ?e.attempt, err, "start failed");
            }
            (EventKind::BeforeStop, _) => {
                tracing::info!(target: "runvisor", unit, "stopping");
            }
            (EventKind::AfterStop, None) => {
                tracing::info!(target: "runvisor", unit, "stopped");
            }
            (EventKind::AfterStop, Some(err)) => {
                tracing::warn!(target: "runvisor", unit, err, "stop failed");
            }
            (EventKind::BeforeRetry, _) => {
                tracing::info!(target: "runvisor", unit, attempt = ?e.attempt, "retrying");
            }
            (EventKind::RetryScheduled, _) => {
                tracing::info!(
                    target: "runvisor",
                    unit,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    "retry scheduled"
                );
            }
            (EventKind::AfterGiveUp, _) => {
                tracing::warn!(
                    target: "runvisor",
                    unit,
                    attempt = ?e.attempt,
                    err = err.unwrap_or("-"),
                    "gave up"
                );
            }
            (EventKind::SignalReceived, _) => {
                let signal = e.signal.map(|s| s.as_label()).unwrap_or("-");
                tracing::info!(target: "runvisor", signal, "signal received");
            }
            (EventKind::ReporterPanicked, _) => {
                tracing::error!(
                    target: "runvisor",
                    reporter = unit,
                    info = err.unwrap_or("unknown"),
                    "reporter panicked"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
