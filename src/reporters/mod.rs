//! # Lifecycle reporters.
//!
//! This module provides the [`Report`] trait and the [`ReporterSet`] the runtime
//! delivers [`Event`](crate::Event)s through.
//!
//! ## Architecture
//! ```text
//! Runner / Retrier ── emit(&Event) ──► ReporterSet
//!                                          │ (registration order, synchronous)
//!                                   ┌──────┼──────────┐
//!                                   ▼      ▼          ▼
//!                               LogWriter  Metrics  Custom ...
//! ```
//!
//! ## Rules
//! - Reporting is best-effort: an empty set is a no-op, and a panicking reporter is
//!   isolated and logged. Neither changes the control flow of a run.
//! - Reporters are called on the task performing the transition; keep them fast.
//!
//! ## Implementing custom reporters
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use runvisor::{Event, EventKind, Report};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! impl Report for FailureCounter {
//!     fn on_event(&self, ev: &Event) {
//!         if ev.is_failure() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

mod log;
mod report;
mod set;

pub use log::LogWriter;
pub use report::Report;
pub use set::ReporterSet;
pub(crate) use set::panic_info;
