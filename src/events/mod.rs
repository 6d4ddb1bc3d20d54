//! Runtime events: the data model handed to reporters.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! ## Quick reference
//! - **Publishers**: `Runner` (load/start/stop/signal), `Retrier` (retry/give-up),
//!   `ReporterSet` (reporter panics).
//! - **Consumers**: every [`Report`](crate::Report) registered in a [`ReporterSet`](crate::ReporterSet).

mod event;

pub use event::{Event, EventKind};
