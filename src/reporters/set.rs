//! # ReporterSet: synchronous fan-out over multiple reporters
//!
//! [`ReporterSet`] delivers each [`Event`] to every registered [`Report`] in
//! registration order, before the reported transition continues.
//!
//! ## What it guarantees
//! - Delivery order equals emit order for every reporter.
//! - Panics inside reporters are caught and logged (isolation); the remaining
//!   reporters still receive the event, plus a `ReporterPanicked` notice.
//!
//! ## What it does **not** guarantee
//! - No retries: an event lost to a panicking reporter stays lost.
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        ├──► reporter 1 .on_event()
//!        ├──► reporter 2 .on_event()   (panic → caught → ReporterPanicked to others)
//!        └──► reporter N .on_event()
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::events::Event;

use super::Report;

/// Cheaply cloneable, ordered set of reporters.
#[derive(Clone, Default)]
pub struct ReporterSet {
    reporters: Arc<[Arc<dyn Report>]>,
}

impl ReporterSet {
    /// Creates a set from the given reporters.
    #[must_use]
    pub fn new(reporters: Vec<Arc<dyn Report>>) -> Self {
        Self {
            reporters: reporters.into(),
        }
    }

    /// Creates a set that reports nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Delivers `event` to every reporter.
    pub fn emit(&self, event: &Event) {
        for (idx, reporter) in self.reporters.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| reporter.on_event(event))) {
                let info = panic_info(panic.as_ref());
                tracing::warn!(
                    reporter = reporter.name(),
                    event = event.kind.as_label(),
                    info = %info,
                    "reporter panicked"
                );
                self.notify_panic(idx, Event::reporter_panicked(reporter.name(), info));
            }
        }
    }

    /// Tells every reporter except the one at `culprit` about a panic.
    fn notify_panic(&self, culprit: usize, notice: Event) {
        for (idx, reporter) in self.reporters.iter().enumerate() {
            if idx == culprit {
                continue;
            }
            let _ = catch_unwind(AssertUnwindSafe(|| reporter.on_event(&notice)));
        }
    }

    /// True if there are no reporters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    /// Number of reporters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reporters.len()
    }
}

impl std::fmt::Debug for ReporterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.reporters.iter().map(|r| r.name()))
            .finish()
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_info(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
