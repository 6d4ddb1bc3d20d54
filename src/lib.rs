//! # runvisor
//!
//! **Runvisor** orchestrates the lifecycle of a process built from long-lived units.
//!
//! A program hands the [`Runner`] an ordered list of units. Resources (databases,
//! caches, clients) are started one after another; servers (HTTP, gRPC listeners)
//! are launched concurrently. The runner then blocks until an OS signal, a caller
//! cancellation, or a server failure, and tears everything down in reverse order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Resource A  │   │  Resource B  │   │   Server X   │   │   Server Y   │
//!     │ (Retrier?)   │   │              │   │              │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼                  ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │  Runner                                                                     │
//! │  - startup loop (load ─► start, strictly sequential)                        │
//! │  - ServerGroup (one listen task per server, failure channel)                │
//! │  - SignalWatch (one subscription per run)                                   │
//! │  - started stack (reverse-order teardown)                                   │
//! └──────────────┬────────────────────────────────────────────┬─────────────────┘
//!                ▼                                            ▼
//!        ReporterSet (sync fan-out)                     SignalSource
//!        ├─ LogWriter (tracing)                         ├─ OsSignals
//!        └─ custom reporters                            └─ ManualSignal
//! ```
//!
//! ### Lifecycle
//! ```text
//! run(ctx, [A, B, X, Y])
//!   ├─► A.load? ─► A.start ─► B.load? ─► B.start       (sequential, rollback on error)
//!   ├─► spawn X.listen, spawn Y.listen                  (concurrent)
//!   ├─► wait: server failure | signal | ctx cancelled
//!   └─► X.close, Y.close, join listen tasks
//!
//! finish(ctx)
//!   └─► B.stop ─► A.stop                                (reverse, resumable)
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types / traits                          |
//! |-----------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Units**       | Capabilities a unit can expose.                               | [`Unit`], [`Resource`], [`Server`], [`Configurable`] |
//! | **Orchestration** | Ordered startup, blocking phase, reverse teardown.          | [`Runner`], [`RunnerBuilder`]               |
//! | **Resilience**  | Retry/backoff/timeout around a resource's start.              | [`Retrier`], [`RetrierBuilder`], [`BackoffPolicy`] |
//! | **Signals**     | Shutdown triggers from the OS or from code.                   | [`SignalSource`], [`OsSignals`], [`ManualSignal`] |
//! | **Reporting**   | Before/after hooks around every transition.                   | [`Report`], [`ReporterSet`], [`LogWriter`]  |
//! | **Errors**      | Typed errors, per-server failure lists.                       | [`RunError`], [`UnitError`], [`MultiError`] |
//! | **Configuration** | Runner settings.                                            | [`RunnerConfig`]                            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{
//!     ManualSignal, ResourceFn, Runner, RunnerConfig, Server, Unit, UnitError, UnitRef,
//! };
//!
//! #[derive(Default)]
//! struct Api(CancellationToken);
//!
//! impl Unit for Api {
//!     fn name(&self) -> &str { "api" }
//!     fn as_server(&self) -> Option<&dyn Server> { Some(self) }
//! }
//!
//! #[async_trait]
//! impl Server for Api {
//!     async fn listen(&self, ctx: CancellationToken) -> Result<(), UnitError> {
//!         tokio::select! {
//!             _ = self.0.cancelled() => Ok(()),
//!             _ = ctx.cancelled() => Err(UnitError::Canceled),
//!         }
//!     }
//!     async fn close(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
//!         self.0.cancel();
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), runvisor::RunError> {
//!     let signal = Arc::new(ManualSignal::new());
//!     let runner = Runner::builder(RunnerConfig::default())
//!         .with_signal_source(signal.clone())
//!         .build();
//!
//!     let db: UnitRef = ResourceFn::arc(
//!         "db",
//!         |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!         |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!     );
//!     let api: UnitRef = Arc::new(Api::default());
//!
//!     // Stand-in for Ctrl-C.
//!     tokio::spawn(async move {
//!         while signal.listeners() == 0 {
//!             tokio::task::yield_now().await;
//!         }
//!         signal.trigger();
//!     });
//!
//!     runner.run(CancellationToken::new(), vec![db, api]).await?;
//!     runner.finish(CancellationToken::new()).await
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod reporters;
mod signals;
mod units;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use core::{DEFAULT_SIGNALS, Runner, RunnerBuilder, RunnerConfig};
pub use error::{MultiError, RunError, UnitError};
pub use events::{Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use reporters::{LogWriter, Report, ReporterSet};
pub use signals::{ManualSignal, OsSignals, Signal, SignalListener, SignalSource};
pub use units::{
    Configurable, Resource, ResourceFn, Retrier, RetrierBuilder, RetryPolicy, Server, Unit,
    UnitRef,
};
