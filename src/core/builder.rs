use std::sync::Arc;

use super::{config::RunnerConfig, runner::Runner};
use crate::{
    reporters::{Report, ReporterSet},
    signals::{OsSignals, SignalSource},
};

/// Builder for constructing a [`Runner`].
pub struct RunnerBuilder {
    cfg: RunnerConfig,
    reporters: Vec<Arc<dyn Report>>,
    signals: Option<Arc<dyn SignalSource>>,
}

impl RunnerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RunnerConfig) -> Self {
        Self {
            cfg,
            reporters: Vec::new(),
            signals: None,
        }
    }

    /// Sets reporters notified before and after every lifecycle transition.
    pub fn with_reporters(mut self, reporters: Vec<Arc<dyn Report>>) -> Self {
        self.reporters = reporters;
        self
    }

    /// Replaces the OS signal source (e.g. with a [`ManualSignal`](crate::ManualSignal)).
    pub fn with_signal_source(mut self, source: Arc<dyn SignalSource>) -> Self {
        self.signals = Some(source);
        self
    }

    /// Builds the runner.
    ///
    /// Without an explicit source, the runner listens to
    /// [`RunnerConfig::effective_signals`] through [`OsSignals`].
    pub fn build(self) -> Runner {
        let signals = self.signals.unwrap_or_else(|| {
            Arc::new(OsSignals::new(self.cfg.effective_signals().iter().copied()))
        });
        Runner::new_internal(self.cfg, ReporterSet::new(self.reporters), signals)
    }
}
