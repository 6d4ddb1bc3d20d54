//! Two resources and two servers, running until Ctrl-C.
//!
//! ```text
//! RUST_LOG=runvisor=debug cargo run --example lifecycle
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use runvisor::{
    BackoffPolicy, LogWriter, Report, ResourceFn, RetrierBuilder, Runner, RunnerConfig, Server,
    Signal, Unit, UnitError, UnitRef,
};

/// Answers every connection with a fixed line.
struct Greeter {
    name: &'static str,
    addr: &'static str,
    closed: CancellationToken,
}

impl Greeter {
    fn arc(name: &'static str, addr: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            addr,
            closed: CancellationToken::new(),
        })
    }
}

impl Unit for Greeter {
    fn name(&self) -> &str {
        self.name
    }

    fn as_server(&self) -> Option<&dyn Server> {
        Some(self)
    }
}

#[async_trait]
impl Server for Greeter {
    async fn listen(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        let listener = TcpListener::bind(self.addr).await.map_err(UnitError::fail)?;
        tracing::info!(server = self.name, addr = self.addr, "listening");

        loop {
            tokio::select! {
                _ = self.closed.cancelled() => return Ok(()),
                _ = ctx.cancelled() => return Err(UnitError::Canceled),
                accepted = listener.accept() => {
                    let (mut stream, peer) = accepted.map_err(UnitError::fail)?;
                    let line = format!("hello from {}, {peer}\n", self.name);
                    if let Err(e) = stream.write_all(line.as_bytes()).await {
                        tracing::warn!(server = self.name, error = %e, "write failed");
                    }
                }
            }
        }
    }

    async fn close(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        self.closed.cancel();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("runvisor=info,info")),
        )
        .init();

    let reporters: Vec<Arc<dyn Report>> = vec![Arc::new(LogWriter::default())];
    let runner = Runner::builder(RunnerConfig::with_signals([Signal::Interrupt, Signal::Terminate]))
        .with_reporters(reporters.clone())
        .build();

    // Connects on the second attempt.
    let tries = Arc::new(AtomicU32::new(0));
    let db: UnitRef = ResourceFn::arc(
        "db",
        move |_ctx: CancellationToken| {
            let tries = tries.clone();
            async move {
                if tries.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(UnitError::fail("connection refused"));
                }
                Ok(())
            }
        },
        |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
    );
    let db = RetrierBuilder::default()
        .attempts(5)
        .backoff(BackoffPolicy::exponential(
            Duration::from_millis(200),
            2.0,
            Duration::from_secs(2),
        ))
        .timeout(Duration::from_secs(10))
        .with_reporters(reporters)
        .build(db);

    let cache: UnitRef = ResourceFn::arc(
        "cache",
        |ctx: CancellationToken| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(300)) => Ok(()),
                _ = ctx.cancelled() => Err(UnitError::Canceled),
            }
        },
        |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
    );

    let units: Vec<UnitRef> = vec![
        db,
        cache,
        Greeter::arc("public", "127.0.0.1:7878") as UnitRef,
        Greeter::arc("admin", "127.0.0.1:7879") as UnitRef,
    ];

    tracing::info!("press Ctrl-C to stop");
    let outcome = runner.run(CancellationToken::new(), units).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "run ended with an error");
    }

    runner.finish(CancellationToken::new()).await?;
    tracing::info!("all resources stopped");
    outcome.map_err(Into::into)
}
