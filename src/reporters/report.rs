//! # Reporter trait.
//!
//! Provides [`Report`] an extension point notified before and after every lifecycle
//! transition performed by the runtime.

use crate::events::Event;

/// Lifecycle observer.
///
/// ### Implementation requirements
/// - Return quickly; the transition being reported waits for every reporter.
/// - Handle errors internally; panics are caught but the event is lost for this reporter.
pub trait Report: Send + Sync + 'static {
    /// Handles a single event.
    fn on_event(&self, event: &Event);

    /// Returns the reporter name used in logs and `ReporterPanicked` events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
