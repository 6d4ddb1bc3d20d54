//! # Shutdown signal sources.
//!
//! The runner subscribes to a [`SignalSource`] exactly once per run and stops the
//! resulting [`SignalListener`] when the run ends, whichever way it ends.
//!
//! ## Contents
//! - [`Signal`] the trigger kinds the runtime knows about
//! - [`SignalSource`] / [`SignalListener`] subscription contracts
//! - [`OsSignals`] process signals via `tokio::signal`
//! - [`ManualSignal`] programmatic trigger for embedders and tests
//!
//! ## Wiring
//! ```text
//! Runner::run()
//!   └─► source.subscribe() ─► listener
//!         └─► watcher task: listener.recv()
//!               ├─ Some(sig) ─► report SignalReceived, cancel startup token
//!               └─ run ended ─► listener.stop()
//! ```

mod manual;
mod os;
mod source;

pub use manual::ManualSignal;
pub use os::OsSignals;
pub use source::{Signal, SignalListener, SignalSource};
