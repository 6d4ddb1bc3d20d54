//! # Programmatic signal source.
//!
//! [`ManualSignal`] lets the embedding application (or a test) request shutdown
//! without an OS signal. Each [`trigger`](ManualSignal::trigger) wakes every listener
//! that is subscribed at that moment; listeners opened later do not observe it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use runvisor::{ManualSignal, Runner, RunnerConfig};
//!
//! let stop = Arc::new(ManualSignal::new());
//! let runner = Runner::builder(RunnerConfig::default())
//!     .with_signal_source(stop.clone())
//!     .build();
//! // later, from anywhere: stop.trigger();
//! # drop(runner);
//! ```

use std::io;

use async_trait::async_trait;
use tokio::sync::watch;

use super::source::{Signal, SignalListener, SignalSource};

/// Signal source fired by calling [`ManualSignal::trigger`].
#[derive(Debug)]
pub struct ManualSignal {
    tx: watch::Sender<u64>,
}

impl ManualSignal {
    /// Creates a source that has never fired.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Fires [`Signal::Manual`] to all current listeners.
    pub fn trigger(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Number of live subscriptions.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ManualSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for ManualSignal {
    fn subscribe(&self) -> io::Result<Box<dyn SignalListener>> {
        Ok(Box::new(ManualListener {
            rx: Some(self.tx.subscribe()),
        }))
    }
}

struct ManualListener {
    rx: Option<watch::Receiver<u64>>,
}

#[async_trait]
impl SignalListener for ManualListener {
    async fn recv(&mut self) -> Option<Signal> {
        let rx = self.rx.as_mut()?;
        match rx.changed().await {
            Ok(()) => Some(Signal::Manual),
            Err(_) => None,
        }
    }

    fn stop(&mut self) {
        self.rx = None;
    }
}
