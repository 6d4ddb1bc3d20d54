//! # Launched servers of one run.
//!
//! [`ServerGroup`] owns one listening task per launched server and the channel their
//! failures arrive on.
//!
//! ## Rules
//! - Every `listen` runs on its own task with a child of the group token.
//! - `Ok(())` and [`UnitError::Canceled`] from `listen` are clean exits; anything else
//!   (including a panic) is queued as `(index, error)`.
//! - [`ServerGroup::shutdown`] closes each server exactly once, cancels the group token,
//!   and returns only after every listening task has exited.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{MultiError, UnitError},
    events::{Event, EventKind},
    reporters::{ReporterSet, panic_info},
    units::UnitRef,
};

pub(super) struct ServerGroup {
    servers: Vec<UnitRef>,
    tasks: JoinSet<()>,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<(usize, UnitError)>,
    rx: mpsc::UnboundedReceiver<(usize, UnitError)>,
}

impl ServerGroup {
    pub(super) fn new(parent: &CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            servers: Vec::new(),
            tasks: JoinSet::new(),
            token: parent.child_token(),
            tx,
            rx,
        }
    }

    /// Spawns `listen` for `unit` without waiting for it.
    pub(super) fn launch(&mut self, unit: UnitRef) {
        let idx = self.servers.len();
        self.servers.push(unit.clone());

        let tx = self.tx.clone();
        let ctx = self.token.child_token();
        self.tasks.spawn(async move {
            let Some(server) = unit.as_server() else {
                return;
            };
            let err = match AssertUnwindSafe(server.listen(ctx)).catch_unwind().await {
                Ok(Ok(())) | Ok(Err(UnitError::Canceled)) => return,
                Ok(Err(e)) => e,
                Err(panic) => {
                    let info = panic_info(panic.as_ref());
                    tracing::error!(unit = unit.name(), info = %info, "listen panicked");
                    UnitError::Panicked { info }
                }
            };
            let _ = tx.send((idx, err));
        });
    }

    pub(super) fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Waits for the first queued server failure.
    pub(super) async fn next_failure(&mut self) -> Option<(usize, UnitError)> {
        self.rx.recv().await
    }

    /// Builds the index-aligned failure list from `first` plus anything else queued.
    pub(super) fn collect_failures(&mut self, first: (usize, UnitError)) -> MultiError {
        let mut multi = MultiError::with_len(self.servers.len());
        multi.set(first.0, first.1);
        while let Ok((idx, err)) = self.rx.try_recv() {
            multi.set(idx, err);
        }
        multi
    }

    /// Closes every server once and waits for all listening tasks to exit.
    pub(super) async fn shutdown(mut self, reporters: &ReporterSet) {
        for unit in &self.servers {
            let Some(server) = unit.as_server() else {
                continue;
            };
            reporters.emit(&Event::new(EventKind::BeforeStop).with_unit(unit.name()));
            let res = server.close(CancellationToken::new()).await;
            reporters.emit(
                &Event::new(EventKind::AfterStop)
                    .with_unit(unit.name())
                    .with_result(&res),
            );
        }
        self.token.cancel();

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "listening task ended abnormally");
            }
        }
    }
}
