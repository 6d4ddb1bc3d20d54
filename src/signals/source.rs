use std::fmt;
use std::io;

use async_trait::async_trait;

/// Shutdown trigger kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT` / Ctrl-C.
    Interrupt,
    /// `SIGTERM`, sent by systemd, Kubernetes and plain `kill`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
    /// `SIGHUP`.
    Hangup,
    /// Programmatic trigger (see [`ManualSignal`](crate::ManualSignal)).
    Manual,
}

impl Signal {
    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Signal::Interrupt => "interrupt",
            Signal::Terminate => "terminate",
            Signal::Quit => "quit",
            Signal::Hangup => "hangup",
            Signal::Manual => "manual",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Factory of signal subscriptions.
///
/// The runner calls [`subscribe`](SignalSource::subscribe) once at the start of every run.
pub trait SignalSource: Send + Sync + 'static {
    /// Opens a new independent subscription.
    fn subscribe(&self) -> io::Result<Box<dyn SignalListener>>;
}

/// One live subscription to a [`SignalSource`].
#[async_trait]
pub trait SignalListener: Send + 'static {
    /// Waits for the next trigger.
    ///
    /// Returns `None` once the listener is stopped or the source is gone.
    async fn recv(&mut self) -> Option<Signal>;

    /// Releases the subscription. Idempotent.
    fn stop(&mut self);
}
