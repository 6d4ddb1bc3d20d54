//! # Process signal source.
//!
//! [`OsSignals`] turns a configured list of [`Signal`]s into a [`SignalListener`].
//!
//! **Unix platforms:** every signal in the list gets its own `tokio::signal::unix` stream
//! forwarded into one channel.
//!
//! **Windows platforms:** only [`Signal::Interrupt`] is observed, via [`tokio::signal::ctrl_c`].
//!
//! [`Signal::Manual`] is never raised by the OS and is skipped.
//!
//! Subscribing must happen inside a tokio runtime.
//!
//! ## Limitation: default handlers are not restored
//! tokio never unregisters a handler installed by `tokio::signal::unix::signal`
//! (or `ctrl_c`). [`SignalListener::stop`] only stops forwarding; it does **not**
//! restore the OS default disposition. Once a run has listened for
//! [`Signal::Interrupt`], a later Ctrl-C that arrives while no run is listening is
//! swallowed instead of terminating the process. Embedders that need the default
//! behavior between runs must exit explicitly (e.g. after [`Runner::finish`](crate::Runner::finish)).

use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::source::{Signal, SignalListener, SignalSource};

/// Signal source backed by OS process signals.
#[derive(Debug, Clone)]
pub struct OsSignals {
    signals: Vec<Signal>,
}

impl OsSignals {
    /// Creates a source listening for the given signals (duplicates are ignored).
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut list: Vec<Signal> = Vec::new();
        for sig in signals {
            if !list.contains(&sig) {
                list.push(sig);
            }
        }
        Self { signals: list }
    }

    /// Signals this source subscribes to.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }
}

impl SignalSource for OsSignals {
    fn subscribe(&self) -> io::Result<Box<dyn SignalListener>> {
        let (tx, rx) = mpsc::channel(self.signals.len().max(1));
        let token = CancellationToken::new();

        for sig in &self.signals {
            if let Err(e) = forward(*sig, tx.clone(), token.clone()) {
                token.cancel();
                return Err(e);
            }
        }
        Ok(Box::new(OsListener { rx, token }))
    }
}

struct OsListener {
    rx: mpsc::Receiver<Signal>,
    token: CancellationToken,
}

#[async_trait]
impl SignalListener for OsListener {
    async fn recv(&mut self) -> Option<Signal> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.token.cancelled() => None,
            sig = self.rx.recv() => sig,
        }
    }

    fn stop(&mut self) {
        self.token.cancel();
        self.rx.close();
    }
}

impl Drop for OsListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(unix)]
fn forward(sig: Signal, tx: mpsc::Sender<Signal>, token: CancellationToken) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let kind = match sig {
        Signal::Interrupt => SignalKind::interrupt(),
        Signal::Terminate => SignalKind::terminate(),
        Signal::Quit => SignalKind::quit(),
        Signal::Hangup => SignalKind::hangup(),
        Signal::Manual => return Ok(()),
    };
    let mut stream = signal(kind)?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                got = stream.recv() => {
                    if got.is_none() || tx.send(sig).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn forward(sig: Signal, tx: mpsc::Sender<Signal>, token: CancellationToken) -> io::Result<()> {
    if sig != Signal::Interrupt {
        return Ok(());
    }
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = tokio::signal::ctrl_c() => {
                    if res.is_err() || tx.send(sig).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}
