//! Recording test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;
use crate::events::{Event, EventKind};
use crate::reporters::Report;
use crate::units::{Configurable, Resource, Server, Unit};

/// Ordered log of calls shared between several fakes.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: String) {
        self.0.lock().expect("journal poisoned").push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal poisoned").clone()
    }

    /// Entries starting with `prefix:`, with the prefix stripped.
    pub(crate) fn of(&self, prefix: &str) -> Vec<String> {
        let tag = format!("{prefix}:");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&tag).map(str::to_string))
            .collect()
    }
}

/// Reporter keeping every event it sees.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().expect("recorder poisoned").clone()
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }

    pub(crate) fn attempts_of(&self, kind: EventKind) -> Vec<u32> {
        self.events()
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| e.attempt)
            .collect()
    }

    pub(crate) fn units_of(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| e.unit.as_deref().map(str::to_string))
            .collect()
    }
}

impl Report for Recorder {
    fn on_event(&self, event: &Event) {
        self.events.lock().expect("recorder poisoned").push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Scriptable resource (optionally configurable).
pub(crate) struct FakeResource {
    name: String,
    journal: Journal,
    configurable: AtomicBool,
    fail_starts: AtomicU32,
    fail_stops: AtomicU32,
    fail_loads: AtomicU32,
    start_delay_ms: AtomicU64,
    ignore_cancel: AtomicBool,
    panic_on_start: AtomicBool,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    load_calls: AtomicU32,
    in_flight: AtomicI32,
}

impl FakeResource {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Self::with_journal(name, &Journal::default())
    }

    pub(crate) fn with_journal(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            configurable: AtomicBool::new(false),
            fail_starts: AtomicU32::new(0),
            fail_stops: AtomicU32::new(0),
            fail_loads: AtomicU32::new(0),
            start_delay_ms: AtomicU64::new(0),
            ignore_cancel: AtomicBool::new(false),
            panic_on_start: AtomicBool::new(false),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            load_calls: AtomicU32::new(0),
            in_flight: AtomicI32::new(0),
        })
    }

    /// The first `n` starts fail (`u32::MAX` = always).
    pub(crate) fn failing_starts(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.fail_starts.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` stops fail.
    pub(crate) fn failing_stops(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.fail_stops.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` loads fail (implies configurable).
    pub(crate) fn failing_loads(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.configurable.store(true, Ordering::SeqCst);
        self.fail_loads.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn configurable(self: Arc<Self>) -> Arc<Self> {
        self.configurable.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn start_delay(self: Arc<Self>, d: Duration) -> Arc<Self> {
        self.start_delay_ms.store(d.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Start keeps running through cancellation until its delay elapses.
    pub(crate) fn ignoring_cancel(self: Arc<Self>) -> Arc<Self> {
        self.ignore_cancel.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn panicking_start(self: Arc<Self>) -> Arc<Self> {
        self.panic_on_start.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> i32 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Unit for FakeResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_resource(&self) -> Option<&dyn Resource> {
        Some(self)
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        if self.configurable.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Configurable for FakeResource {
    async fn load(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        let n = self.load_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.push(format!("load:{}", self.name));
        if n <= self.fail_loads.load(Ordering::SeqCst) {
            return Err(UnitError::fail(format!("load {} failed", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for FakeResource {
    async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.push(format!("start:{}", self.name));
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let delay = Duration::from_millis(self.start_delay_ms.load(Ordering::SeqCst));
        if !delay.is_zero() {
            if self.ignore_cancel.load(Ordering::SeqCst) {
                tokio::time::sleep(delay).await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => {
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        return Err(UnitError::Canceled);
                    }
                }
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on_start.load(Ordering::SeqCst) {
            panic!("start {} panicked", self.name);
        }
        if n <= self.fail_starts.load(Ordering::SeqCst) {
            return Err(UnitError::fail(format!("start {} failed", self.name)));
        }
        self.journal.push(format!("started:{}", self.name));
        Ok(())
    }

    async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        let n = self.stop_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.push(format!("stop:{}", self.name));
        if n <= self.fail_stops.load(Ordering::SeqCst) {
            return Err(UnitError::fail(format!("stop {} failed", self.name)));
        }
        Ok(())
    }
}

/// Scriptable server.
pub(crate) struct FakeServer {
    name: String,
    journal: Journal,
    fail_after: Mutex<Option<(Duration, UnitError)>>,
    listening: AtomicBool,
    closed: CancellationToken,
    listen_calls: AtomicU32,
    listen_returned: AtomicU32,
    close_calls: AtomicU32,
}

impl FakeServer {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Self::with_journal(name, &Journal::default())
    }

    pub(crate) fn with_journal(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            fail_after: Mutex::new(None),
            listening: AtomicBool::new(false),
            closed: CancellationToken::new(),
            listen_calls: AtomicU32::new(0),
            listen_returned: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
        })
    }

    /// `listen` returns `err` after `after` unless closed first.
    pub(crate) fn failing_after(self: Arc<Self>, after: Duration, err: UnitError) -> Arc<Self> {
        *self.fail_after.lock().expect("poisoned") = Some((after, err));
        self
    }

    pub(crate) fn listen_calls(&self) -> u32 {
        self.listen_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn listen_returned(&self) -> u32 {
        self.listen_returned.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn serve(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        let fail = self.fail_after.lock().expect("poisoned").clone();
        match fail {
            Some((after, err)) => {
                tokio::select! {
                    _ = tokio::time::sleep(after) => Err(err),
                    _ = self.closed.cancelled() => Ok(()),
                    _ = ctx.cancelled() => Err(UnitError::Canceled),
                }
            }
            None => {
                tokio::select! {
                    _ = self.closed.cancelled() => Ok(()),
                    _ = ctx.cancelled() => Err(UnitError::Canceled),
                }
            }
        }
    }
}

impl Unit for FakeServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_server(&self) -> Option<&dyn Server> {
        Some(self)
    }
}

#[async_trait]
impl Server for FakeServer {
    async fn listen(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(UnitError::AlreadyListening);
        }
        self.journal.push(format!("listen:{}", self.name));

        let res = self.serve(ctx).await;

        self.listening.store(false, Ordering::SeqCst);
        self.listen_returned.fetch_add(1, Ordering::SeqCst);
        res
    }

    async fn close(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("close:{}", self.name));
        self.closed.cancel();
        Ok(())
    }
}

/// Unit with no startable capability.
pub(crate) struct Inert(pub(crate) &'static str);

impl Unit for Inert {
    fn name(&self) -> &str {
        self.0
    }
}
