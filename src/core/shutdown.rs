//! # Per-run signal subscription.
//!
//! [`SignalWatch`] subscribes to the runner's [`SignalSource`] once and spawns a watcher
//! that consumes at most one trigger:
//!
//! ```text
//! listener.recv()
//!   ├─ Some(sig) ─► record sig ─► report SignalReceived ─► cancel startup token ─► fired
//!   ├─ None      ─► (source closed) wait for the run to end
//!   └─ run ended ─► listener.stop()
//! ```
//!
//! [`SignalWatch::stop`] ends the watcher and waits until the listener is released,
//! so no subscription outlives the run that opened it.

use std::io;
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::{
    events::{Event, EventKind},
    reporters::ReporterSet,
    signals::{Signal, SignalSource},
};

pub(super) struct SignalWatch {
    handle: JoinHandle<()>,
    done: CancellationToken,
    fired: CancellationToken,
    signal: Arc<OnceLock<Signal>>,
}

impl SignalWatch {
    /// Subscribes to `source`; a trigger cancels `startup`.
    pub(super) fn spawn(
        source: &dyn SignalSource,
        startup: CancellationToken,
        reporters: ReporterSet,
    ) -> io::Result<Self> {
        let mut listener = source.subscribe()?;
        let done = CancellationToken::new();
        let fired = CancellationToken::new();
        let signal = Arc::new(OnceLock::new());

        let (run_done, on_fire, slot) = (done.clone(), fired.clone(), Arc::clone(&signal));
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = run_done.cancelled() => {}
                got = listener.recv() => match got {
                    Some(sig) => {
                        let _ = slot.set(sig);
                        tracing::debug!(signal = sig.as_label(), "shutdown signal received");
                        reporters.emit(&Event::new(EventKind::SignalReceived).with_signal(sig));
                        on_fire.cancel();
                        startup.cancel();
                    }
                    None => run_done.cancelled().await,
                },
            }
            listener.stop();
        });

        Ok(Self {
            handle,
            done,
            fired,
            signal,
        })
    }

    /// Resolves once a signal has been received.
    pub(super) fn fired(&self) -> WaitForCancellationFuture<'_> {
        self.fired.cancelled()
    }

    /// The received signal, if any.
    pub(super) fn signal(&self) -> Option<Signal> {
        self.signal.get().copied()
    }

    /// Unsubscribes and waits for the watcher to exit.
    pub(super) async fn stop(self) {
        self.done.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "signal watcher ended abnormally");
        }
    }
}
