//! # Runner: ordered startup, concurrent servers, deterministic teardown.
//!
//! The [`Runner`] takes an ordered list of [`UnitRef`]s, starts resources one at a time,
//! launches servers concurrently, blocks until shutdown is requested, and stops
//! resources in exact reverse start order.
//!
//! ## Key responsibilities
//! - load configurable units before they start
//! - start resources sequentially, recording them in start-completion order
//! - launch servers on their own tasks and collect their failures
//! - subscribe to the [`SignalSource`] once per run
//! - roll back everything a failed `run` started before returning the error
//!
//! ## Startup
//! ```text
//! run(ctx, units)
//!   ├─► lock run state            (one run/finish at a time)
//!   ├─► finish() requested while queued ─► Err(Canceled), nothing touched
//!   ├─► run_token = ctx.child     (published for finish())
//!   ├─► startup  = run_token.child, also cancelled by the signal watcher
//!   └─► for unit in units:
//!         ├─ startup cancelled ─► no servers: Err(Canceled | Interrupted)
//!         │                       servers:    stop launching, go blocking
//!         ├─ neither resource nor server ─► Err(NotStartable)
//!         ├─ configurable ─► BeforeLoad ─► load() ─► AfterLoad   (Err ─► Err(Load))
//!         ├─ resource ─► BeforeStart ─► start() ─► AfterStart    (Err ─► Err(Start))
//!         │              (a cancelled load/start after startup was cancelled is treated
//!         │               as the cancellation itself, not as a unit failure)
//!         │              └─► started.push(unit)
//!         └─ server   ─► BeforeStart ─► spawn listen()           (never blocks the loop)
//! ```
//!
//! ## Blocking phase (at least one server launched)
//! ```text
//! select! (first wins)
//!   ├─ server failure ─► Err(Servers([.., Some(err), ..]))
//!   ├─ signal         ─► Ok(())
//!   └─ run_token      ─► Err(Canceled)
//! then: close() every server once, wait until every listen() has returned
//! ```
//!
//! ## Failure paths
//! - any `Err` from `run` rolls back the resources this call started (reverse order)
//! - a panic in the startup loop closes launched servers, rolls back, then resumes the panic
//! - resources survive a successful `run`; [`Runner::finish`] stops them
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{ManualSignal, ResourceFn, Runner, RunnerConfig, UnitError, UnitRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), runvisor::RunError> {
//!     let runner = Runner::builder(RunnerConfig::default())
//!         .with_signal_source(Arc::new(ManualSignal::new()))
//!         .build();
//!
//!     let db: UnitRef = ResourceFn::arc(
//!         "db",
//!         |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!         |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!     );
//!
//!     // Resources only: returns as soon as everything started.
//!     runner.run(CancellationToken::new(), vec![db]).await?;
//!     assert_eq!(runner.started().await, vec!["db".to_string()]);
//!
//!     runner.finish(CancellationToken::new()).await?;
//!     assert!(runner.started().await.is_empty());
//!     Ok(())
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    builder::RunnerBuilder, config::RunnerConfig, servers::ServerGroup, shutdown::SignalWatch,
};
use crate::{
    error::RunError,
    events::{Event, EventKind},
    reporters::ReporterSet,
    signals::SignalSource,
    units::UnitRef,
};

/// Run state guarded by the runner's mutex.
#[derive(Default)]
struct RunState {
    /// Resources whose start succeeded and whose stop has not, in start-completion order.
    started: Vec<UnitRef>,
}

/// Handle of the active run, shared with `finish`.
#[derive(Default)]
struct ActiveRun {
    /// Token of the active run; `Some` only while `run` is executing.
    token: Option<CancellationToken>,
    /// Number of `finish` calls so far.
    finishes: u64,
}

/// Orchestrates startup and teardown of resources and servers.
pub struct Runner {
    cfg: RunnerConfig,
    reporters: ReporterSet,
    signals: Arc<dyn SignalSource>,
    state: Mutex<RunState>,
    active: StdMutex<ActiveRun>,
}

impl Runner {
    /// Returns a builder for a runner with the given config.
    pub fn builder(cfg: RunnerConfig) -> RunnerBuilder {
        RunnerBuilder::new(cfg)
    }

    /// Creates a runner with no reporters, listening to the config's OS signals.
    pub fn new(cfg: RunnerConfig) -> Self {
        RunnerBuilder::new(cfg).build()
    }

    pub(super) fn new_internal(
        cfg: RunnerConfig,
        reporters: ReporterSet,
        signals: Arc<dyn SignalSource>,
    ) -> Self {
        Self {
            cfg,
            reporters,
            signals,
            state: Mutex::new(RunState::default()),
            active: StdMutex::new(ActiveRun::default()),
        }
    }

    /// Returns the runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.cfg
    }

    /// Names of running resources, in start order.
    ///
    /// Waits for an in-flight `run`/`finish` to complete.
    pub async fn started(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.started.iter().map(|u| u.name().to_string()).collect()
    }

    /// True while a `run` call is executing.
    pub fn is_running(&self) -> bool {
        self.slot().token.is_some()
    }

    /// Starts `units` in order.
    ///
    /// - Without servers, returns once every resource started (or the first failure).
    /// - With servers, blocks until a server fails, a signal arrives, or `ctx` is cancelled,
    ///   then closes every server and waits for all of them to stop listening.
    ///
    /// On `Err`, every resource started by this call has already been stopped.
    /// On `Ok`, started resources keep running until [`Runner::finish`].
    ///
    /// A `run` still waiting for an earlier call when [`Runner::finish`] is requested
    /// returns [`RunError::Canceled`] without touching any unit.
    ///
    /// # Panics
    /// A panic raised by a unit during startup is resumed after the rollback.
    pub async fn run(&self, ctx: CancellationToken, units: Vec<UnitRef>) -> Result<(), RunError> {
        let epoch = self.slot().finishes;
        let mut state = self.state.lock().await;

        let run_token = ctx.child_token();
        if !self.publish(&run_token, epoch) {
            return Err(RunError::Canceled);
        }
        let startup = run_token.child_token();
        let watch = match SignalWatch::spawn(
            self.signals.as_ref(),
            startup.clone(),
            self.reporters.clone(),
        ) {
            Ok(watch) => watch,
            Err(e) => {
                self.unpublish();
                return Err(RunError::Signal(e));
            }
        };

        let mark = state.started.len();
        let mut servers = ServerGroup::new(&run_token);

        let startup_res = AssertUnwindSafe(self.start_units(
            &mut state,
            &mut servers,
            units,
            &startup,
            &watch,
        ))
        .catch_unwind()
        .await;

        let result = match startup_res {
            Ok(Ok(())) if servers.is_empty() => Ok(()),
            Ok(Ok(())) => self.wait_servers(&mut servers, &run_token, &watch).await,
            Ok(Err(e)) => Err(e),
            Err(panic) => {
                servers.shutdown(&self.reporters).await;
                self.rollback(&mut state, mark).await;
                watch.stop().await;
                self.unpublish();
                std::panic::resume_unwind(panic);
            }
        };

        servers.shutdown(&self.reporters).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, label = e.as_label(), "run failed, rolling back");
            self.rollback(&mut state, mark).await;
        }
        watch.stop().await;
        self.unpublish();
        result
    }

    /// Stops every running resource in reverse start order.
    ///
    /// Cancels the in-flight `run` and every `run` queued behind it, then waits for
    /// them to return. Stops at the first failure; the failed unit and everything
    /// started before it remain recorded, so calling `finish` again resumes from there.
    pub async fn finish(&self, ctx: CancellationToken) -> Result<(), RunError> {
        {
            let mut slot = self.slot();
            slot.finishes += 1;
            if let Some(token) = &slot.token {
                token.cancel();
            }
        }
        let mut state = self.state.lock().await;
        self.teardown(&mut state, 0, &ctx).await
    }

    /// The sequential part of `run`.
    async fn start_units(
        &self,
        state: &mut RunState,
        servers: &mut ServerGroup,
        units: Vec<UnitRef>,
        startup: &CancellationToken,
        watch: &SignalWatch,
    ) -> Result<(), RunError> {
        for unit in units {
            if startup.is_cancelled() {
                return self.halted(servers, watch);
            }

            let is_resource = unit.as_resource().is_some();
            if !is_resource && unit.as_server().is_none() {
                return Err(RunError::NotStartable {
                    unit: unit.name().to_string(),
                });
            }

            if let Some(cfg) = unit.as_configurable() {
                self.emit(Event::new(EventKind::BeforeLoad).with_unit(unit.name()));
                let res = cfg.load(startup.clone()).await;
                self.emit(
                    Event::new(EventKind::AfterLoad)
                        .with_unit(unit.name())
                        .with_result(&res),
                );
                if let Err(source) = res {
                    if source.is_canceled() && startup.is_cancelled() {
                        return self.halted(servers, watch);
                    }
                    return Err(RunError::Load {
                        unit: unit.name().to_string(),
                        source,
                    });
                }
                if startup.is_cancelled() {
                    return self.halted(servers, watch);
                }
            }

            self.emit(Event::new(EventKind::BeforeStart).with_unit(unit.name()));
            match unit.as_resource() {
                Some(res) => {
                    let res = res.start(startup.clone()).await;
                    self.emit(
                        Event::new(EventKind::AfterStart)
                            .with_unit(unit.name())
                            .with_result(&res),
                    );
                    if let Err(source) = res {
                        if source.is_canceled() && startup.is_cancelled() {
                            return self.halted(servers, watch);
                        }
                        return Err(RunError::Start {
                            unit: unit.name().to_string(),
                            source,
                        });
                    }
                    state.started.push(unit);
                }
                None => servers.launch(unit),
            }
        }

        if startup.is_cancelled() {
            return self.halted(servers, watch);
        }
        Ok(())
    }

    /// Outcome of a cancelled startup loop.
    ///
    /// Once a server runs, the blocking phase reports the cause instead.
    fn halted(&self, servers: &ServerGroup, watch: &SignalWatch) -> Result<(), RunError> {
        if !servers.is_empty() {
            return Ok(());
        }
        match watch.signal() {
            Some(signal) => Err(RunError::Interrupted { signal }),
            None => Err(RunError::Canceled),
        }
    }

    /// Blocks until the first of: server failure, signal, cancellation.
    async fn wait_servers(
        &self,
        servers: &mut ServerGroup,
        run_token: &CancellationToken,
        watch: &SignalWatch,
    ) -> Result<(), RunError> {
        tokio::select! {
            biased;
            Some(first) = servers.next_failure() => {
                Err(RunError::Servers(servers.collect_failures(first)))
            }
            _ = watch.fired() => Ok(()),
            _ = run_token.cancelled() => Err(RunError::Canceled),
        }
    }

    /// Stops what the failed run started, keeping the run's error.
    async fn rollback(&self, state: &mut RunState, mark: usize) {
        if let Err(e) = self.teardown(state, mark, &CancellationToken::new()).await {
            tracing::warn!(error = %e, "rollback stopped early; remaining resources still running");
        }
    }

    /// Stops resources from the newest down to index `floor`.
    async fn teardown(
        &self,
        state: &mut RunState,
        floor: usize,
        ctx: &CancellationToken,
    ) -> Result<(), RunError> {
        while state.started.len() > floor {
            let Some(unit) = state.started.last().cloned() else {
                break;
            };

            self.emit(Event::new(EventKind::BeforeStop).with_unit(unit.name()));
            let res = match unit.as_resource() {
                Some(res) => res.stop(ctx.child_token()).await,
                None => Ok(()),
            };
            self.emit(
                Event::new(EventKind::AfterStop)
                    .with_unit(unit.name())
                    .with_result(&res),
            );
            if let Err(source) = res {
                return Err(RunError::Stop {
                    unit: unit.name().to_string(),
                    source,
                });
            }
            state.started.pop();
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        self.reporters.emit(&event);
    }

    fn slot(&self) -> MutexGuard<'_, ActiveRun> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `token` visible to `finish`, unless a `finish` arrived since `epoch`.
    fn publish(&self, token: &CancellationToken, epoch: u64) -> bool {
        let mut slot = self.slot();
        if slot.finishes != epoch {
            return false;
        }
        slot.token = Some(token.clone());
        true
    }

    fn unpublish(&self) {
        self.slot().token = None;
    }
}
