//! Runtime core: orchestration and lifecycle.
//!
//! The only public API from this module is [`Runner`] (plus its builder and config),
//! which starts units, blocks on servers, and tears everything down in reverse.
//!
//! Internal modules:
//! - [`runner`]: the startup loop, blocking phase, rollback and `finish`;
//! - [`servers`]: launched servers of one run and their failure channel;
//! - [`shutdown`]: per-run signal subscription;
//! - [`builder`] / [`config`]: construction.

mod builder;
mod config;
mod runner;
mod servers;
mod shutdown;

#[cfg(test)]
mod tests;

pub use builder::RunnerBuilder;
pub use config::{DEFAULT_SIGNALS, RunnerConfig};
pub use runner::Runner;
