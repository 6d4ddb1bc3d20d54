use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::{Runner, RunnerConfig};
use crate::{
    error::{RunError, UnitError},
    events::EventKind,
    reporters::Report,
    signals::{ManualSignal, Signal},
    testing::{FakeResource, FakeServer, Inert, Journal, Recorder},
    units::{RetrierBuilder, UnitRef},
};

fn runner(signal: &Arc<ManualSignal>, rec: &Arc<Recorder>) -> Arc<Runner> {
    let reporters: Vec<Arc<dyn Report>> = vec![rec.clone()];
    Arc::new(
        Runner::builder(RunnerConfig::default())
            .with_reporters(reporters)
            .with_signal_source(signal.clone())
            .build(),
    )
}

fn quiet_runner() -> (Arc<Runner>, Arc<ManualSignal>) {
    let signal = Arc::new(ManualSignal::new());
    (runner(&signal, &Arc::new(Recorder::default())), signal)
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

macro_rules! units {
    ($($u:expr),* $(,)?) => {
        vec![$($u.clone() as UnitRef),*]
    };
}

#[tokio::test]
async fn resources_start_in_order_and_stay_up() {
    let (r, signal) = quiet_runner();
    let journal = Journal::default();
    let a = FakeResource::with_journal("a", &journal);
    let b = FakeResource::with_journal("b", &journal);
    let c = FakeResource::with_journal("c", &journal);

    r.run(CancellationToken::new(), units![a, b, c])
        .await
        .expect("run");

    assert_eq!(journal.of("started"), vec!["a", "b", "c"]);
    assert_eq!(r.started().await, vec!["a", "b", "c"]);
    assert_eq!(a.stop_calls() + b.stop_calls() + c.stop_calls(), 0);
    assert!(!r.is_running());
    assert_eq!(signal.listeners(), 0);
}

#[tokio::test]
async fn failed_start_rolls_back_earlier_resources() {
    let (r, _signal) = quiet_runner();
    let journal = Journal::default();
    let a = FakeResource::with_journal("a", &journal);
    let b = FakeResource::with_journal("b", &journal).failing_starts(u32::MAX);
    let c = FakeResource::with_journal("c", &journal);

    let err = r
        .run(CancellationToken::new(), units![a, b, c])
        .await
        .expect_err("b fails");

    match err {
        RunError::Start { unit, source } => {
            assert_eq!(unit, "b");
            assert_eq!(source, UnitError::fail("start b failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(a.stop_calls(), 1);
    assert_eq!(b.stop_calls(), 0);
    assert_eq!(c.start_calls(), 0);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn signal_during_servers_is_graceful() {
    let signal = Arc::new(ManualSignal::new());
    let rec = Arc::new(Recorder::default());
    let r = runner(&signal, &rec);
    let db = FakeResource::new("db");
    let servers = [FakeServer::new("s1"), FakeServer::new("s2"), FakeServer::new("s3")];

    let mut list: Vec<UnitRef> = vec![db.clone() as UnitRef];
    list.extend(servers.iter().map(|s| s.clone() as UnitRef));

    let handle = tokio::spawn({
        let r = r.clone();
        async move { r.run(CancellationToken::new(), list).await }
    });

    wait_until("servers listening", || servers.iter().all(|s| s.is_listening())).await;
    assert!(r.is_running());
    signal.trigger();

    let res = handle.await.expect("join");
    assert!(res.is_ok(), "{res:?}");
    for s in &servers {
        assert_eq!(s.close_calls(), 1);
        assert_eq!(s.listen_returned(), 1);
    }
    assert_eq!(rec.count(EventKind::SignalReceived), 1);
    assert_eq!(r.started().await, vec!["db"]);
    assert_eq!(db.stop_calls(), 0);
    assert_eq!(signal.listeners(), 0);
}

#[tokio::test]
async fn server_failure_is_index_aligned_and_closes_siblings() {
    let (r, _signal) = quiet_runner();
    let db = FakeResource::new("db");
    let s1 = FakeServer::new("s1");
    let s2 = FakeServer::new("s2");
    let s3 = FakeServer::new("s3")
        .failing_after(Duration::from_millis(20), UnitError::fail("port in use"));

    let err = r
        .run(
            CancellationToken::new(),
            units![db, s1, s2, s3],
        )
        .await
        .expect_err("s3 fails");

    let multi = err.servers().expect("server failure");
    assert_eq!(multi.len(), 3);
    assert_eq!(multi.get(0), None);
    assert_eq!(multi.get(1), None);
    assert_eq!(multi.get(2), Some(&UnitError::fail("port in use")));
    assert_eq!(multi.to_string(), "ok, ok, port in use");

    assert_eq!(s1.close_calls(), 1);
    assert_eq!(s2.close_calls(), 1);
    assert_eq!(s1.listen_returned() + s2.listen_returned() + s3.listen_returned(), 3);
    assert_eq!(db.stop_calls(), 1);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn load_failure_skips_start_and_later_units() {
    let (r, _signal) = quiet_runner();
    let a = FakeResource::new("a").configurable();
    let b = FakeResource::new("b").failing_loads(1);
    let c = FakeResource::new("c");

    let err = r
        .run(CancellationToken::new(), units![a, b, c])
        .await
        .expect_err("load fails");

    assert!(matches!(err, RunError::Load { ref unit, .. } if unit == "b"));
    assert_eq!(a.load_calls(), 1);
    assert_eq!(a.stop_calls(), 1);
    assert_eq!(b.load_calls(), 1);
    assert_eq!(b.start_calls(), 0);
    assert_eq!(c.start_calls(), 0);
}

#[tokio::test]
async fn finish_stops_in_reverse_and_is_idempotent() {
    let signal = Arc::new(ManualSignal::new());
    let rec = Arc::new(Recorder::default());
    let r = runner(&signal, &rec);
    let journal = Journal::default();
    let list: Vec<UnitRef> = vec![
        FakeResource::with_journal("a", &journal) as UnitRef,
        FakeResource::with_journal("b", &journal) as UnitRef,
        FakeResource::with_journal("c", &journal) as UnitRef,
    ];

    r.run(CancellationToken::new(), list).await.expect("run");
    r.finish(CancellationToken::new()).await.expect("finish");
    r.finish(CancellationToken::new()).await.expect("second finish");

    assert_eq!(journal.of("stop"), vec!["c", "b", "a"]);
    assert_eq!(rec.units_of(EventKind::AfterStop), vec!["c", "b", "a"]);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn failed_stop_keeps_remaining_units_for_retry() {
    let (r, _signal) = quiet_runner();
    let journal = Journal::default();
    let a = FakeResource::with_journal("a", &journal);
    let b = FakeResource::with_journal("b", &journal).failing_stops(1);
    let c = FakeResource::with_journal("c", &journal);

    r.run(CancellationToken::new(), units![a, b, c])
        .await
        .expect("run");

    let err = r.finish(CancellationToken::new()).await.expect_err("b fails to stop");
    assert!(matches!(err, RunError::Stop { ref unit, .. } if unit == "b"));
    assert_eq!(r.started().await, vec!["a", "b"]);
    assert_eq!(a.stop_calls(), 0);

    r.finish(CancellationToken::new()).await.expect("retry");
    assert_eq!(journal.of("stop"), vec!["c", "b", "b", "a"]);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn cancelled_before_start_does_nothing() {
    let (r, signal) = quiet_runner();
    let a = FakeResource::new("a");
    let s = FakeServer::new("s");
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = r
        .run(ctx, units![a, s])
        .await
        .expect_err("cancelled");

    assert!(matches!(err, RunError::Canceled));
    assert!(err.is_canceled());
    assert_eq!(a.start_calls(), 0);
    assert_eq!(s.listen_calls(), 0);
    assert_eq!(signal.listeners(), 0);
}

#[tokio::test]
async fn caller_cancel_while_serving_returns_canceled() {
    let (r, _signal) = quiet_runner();
    let db = FakeResource::new("db");
    let s = FakeServer::new("s");
    let ctx = CancellationToken::new();

    let handle = tokio::spawn({
        let (r, ctx, list) = (r.clone(), ctx.clone(), units![db, s]);
        async move { r.run(ctx, list).await }
    });

    wait_until("server listening", || s.is_listening()).await;
    ctx.cancel();

    let err = handle.await.expect("join").expect_err("cancelled");
    assert!(matches!(err, RunError::Canceled));
    assert_eq!(s.close_calls(), 1);
    assert_eq!(s.listen_returned(), 1);
    assert_eq!(db.stop_calls(), 1);
}

#[tokio::test]
async fn signal_during_resource_phase_interrupts_and_rolls_back() {
    let (r, signal) = quiet_runner();
    let journal = Journal::default();
    let a = FakeResource::with_journal("a", &journal);
    let slow = FakeResource::with_journal("slow", &journal)
        .start_delay(Duration::from_millis(100))
        .ignoring_cancel();
    let c = FakeResource::with_journal("c", &journal);

    let handle = tokio::spawn({
        let (r, list) = (r.clone(), units![a, slow, c]);
        async move { r.run(CancellationToken::new(), list).await }
    });

    wait_until("slow start in flight", || slow.in_flight() == 1).await;
    signal.trigger();

    let err = handle.await.expect("join").expect_err("interrupted");
    assert!(matches!(
        err,
        RunError::Interrupted {
            signal: Signal::Manual
        }
    ));
    assert!(err.is_canceled());
    assert_eq!(c.start_calls(), 0);
    // The in-flight start finished before the rollback began.
    assert_eq!(journal.of("stop"), vec!["slow", "a"]);
    let entries = journal.entries();
    let started = entries.iter().position(|e| e == "started:slow");
    let stopped = entries.iter().position(|e| e == "stop:slow");
    assert!(started < stopped);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn signal_after_server_launch_stops_startup_gracefully() {
    let (r, signal) = quiet_runner();
    let s = FakeServer::new("s");
    let slow = FakeResource::new("slow")
        .start_delay(Duration::from_millis(100))
        .ignoring_cancel();
    let c = FakeResource::new("c");
    let s2 = FakeServer::new("s2");

    let handle = tokio::spawn({
        let (r, list) = (r.clone(), units![s, slow, c, s2]);
        async move { r.run(CancellationToken::new(), list).await }
    });

    wait_until("slow start in flight", || slow.in_flight() == 1).await;
    signal.trigger();

    let res = handle.await.expect("join");
    assert!(res.is_ok(), "{res:?}");
    assert_eq!(c.start_calls(), 0);
    assert_eq!(s2.listen_calls(), 0);
    assert_eq!(s.close_calls(), 1);
    assert_eq!(s.listen_returned(), 1);
    assert_eq!(r.started().await, vec!["slow"]);
    assert_eq!(slow.stop_calls(), 0);
}

#[tokio::test]
async fn early_server_failure_waits_for_remaining_starts() {
    let (r, _signal) = quiet_runner();
    let journal = Journal::default();
    let s = FakeServer::with_journal("s", &journal)
        .failing_after(Duration::from_millis(10), UnitError::fail("bind failed"));
    let slow = FakeResource::with_journal("slow", &journal).start_delay(Duration::from_millis(80));
    let c = FakeResource::with_journal("c", &journal);

    let err = r
        .run(CancellationToken::new(), units![s, slow, c])
        .await
        .expect_err("server failure surfaces after startup");

    let multi = err.servers().expect("server failure");
    assert_eq!(multi.errors(), &[Some(UnitError::fail("bind failed"))]);
    assert_eq!(journal.of("started"), vec!["slow", "c"]);
    assert_eq!(journal.of("stop"), vec!["c", "slow"]);
    assert_eq!(s.close_calls(), 1);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn signal_cancels_cooperative_start() {
    let (r, signal) = quiet_runner();
    let a = FakeResource::new("a");
    let slow = FakeResource::new("slow").start_delay(Duration::from_secs(10));

    let handle = tokio::spawn({
        let (r, list) = (r.clone(), units![a, slow]);
        async move { r.run(CancellationToken::new(), list).await }
    });

    wait_until("slow start in flight", || slow.in_flight() == 1).await;
    signal.trigger();

    let err = handle.await.expect("join").expect_err("interrupted");
    assert!(matches!(err, RunError::Interrupted { .. }));
    assert_eq!(slow.stop_calls(), 0);
    assert_eq!(a.stop_calls(), 1);
}

#[tokio::test]
async fn unit_without_capability_is_not_startable() {
    let (r, _signal) = quiet_runner();
    let a = FakeResource::new("a");
    let inert: UnitRef = Arc::new(Inert("inert"));

    let err = r
        .run(CancellationToken::new(), vec![a.clone() as UnitRef, inert])
        .await
        .expect_err("not startable");

    assert!(matches!(err, RunError::NotStartable { ref unit } if unit == "inert"));
    assert_eq!(a.stop_calls(), 1);
}

#[tokio::test]
async fn panicking_start_rolls_back_then_resumes() {
    let (r, signal) = quiet_runner();
    let a = FakeResource::new("a");
    let bad = FakeResource::new("bad").panicking_start();
    let s = FakeServer::new("s");

    let res = AssertUnwindSafe(r.run(CancellationToken::new(), units![s, a, bad]))
        .catch_unwind()
        .await;

    assert!(res.is_err(), "panic must propagate");
    assert_eq!(a.stop_calls(), 1);
    assert_eq!(s.close_calls(), 1);
    assert!(!r.is_running());
    assert_eq!(signal.listeners(), 0);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn finish_during_servers_ends_the_run() {
    let (r, _signal) = quiet_runner();
    let db = FakeResource::new("db");
    let s = FakeServer::new("s");

    let handle = tokio::spawn({
        let (r, list) = (r.clone(), units![db, s]);
        async move { r.run(CancellationToken::new(), list).await }
    });

    wait_until("server listening", || s.is_listening()).await;
    r.finish(CancellationToken::new()).await.expect("finish");

    let res = handle.await.expect("join");
    assert!(matches!(res, Err(RunError::Canceled)));
    assert_eq!(s.close_calls(), 1);
    assert_eq!(db.stop_calls(), 1);
    assert!(r.started().await.is_empty());
}

#[tokio::test]
async fn finish_cancels_runs_queued_behind_the_active_one() {
    let (r, _signal) = quiet_runner();
    let s1 = FakeServer::new("s1");
    let db2 = FakeResource::new("db2");
    let s2 = FakeServer::new("s2");

    let first = tokio::spawn({
        let (r, list) = (r.clone(), units![s1]);
        async move { r.run(CancellationToken::new(), list).await }
    });
    wait_until("first server listening", || s1.is_listening()).await;

    let second = tokio::spawn({
        let (r, list) = (r.clone(), units![db2, s2]);
        async move { r.run(CancellationToken::new(), list).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(1), r.finish(CancellationToken::new()))
        .await
        .expect("finish must not wait behind a queued run")
        .expect("finish");

    assert!(matches!(first.await.expect("join"), Err(RunError::Canceled)));
    assert!(matches!(second.await.expect("join"), Err(RunError::Canceled)));
    assert_eq!(db2.start_calls(), 0);
    assert_eq!(s2.listen_calls(), 0);
    assert_eq!(s1.close_calls(), 1);
    assert!(!r.is_running());
}

#[tokio::test]
async fn run_after_finish_is_not_cancelled() {
    let (r, _signal) = quiet_runner();
    let a = FakeResource::new("a");

    r.finish(CancellationToken::new()).await.expect("finish with nothing running");
    r.run(CancellationToken::new(), units![a])
        .await
        .expect("later run proceeds");

    assert_eq!(a.start_calls(), 1);
    assert_eq!(r.started().await, vec!["a"]);
}

#[tokio::test]
async fn reporters_see_every_transition() {
    let signal = Arc::new(ManualSignal::new());
    let rec = Arc::new(Recorder::default());
    let r = runner(&signal, &rec);
    let a = FakeResource::new("a").configurable();

    r.run(CancellationToken::new(), units![a])
        .await
        .expect("run");
    r.finish(CancellationToken::new()).await.expect("finish");

    assert_eq!(
        rec.kinds(),
        vec![
            EventKind::BeforeLoad,
            EventKind::AfterLoad,
            EventKind::BeforeStart,
            EventKind::AfterStart,
            EventKind::BeforeStop,
            EventKind::AfterStop,
        ]
    );
    assert!(rec.events().iter().all(|e| e.unit.as_deref() == Some("a")));
    assert!(rec.events().iter().all(|e| !e.is_failure()));
}

#[tokio::test]
async fn failures_are_reported_with_their_error() {
    let signal = Arc::new(ManualSignal::new());
    let rec = Arc::new(Recorder::default());
    let r = runner(&signal, &rec);
    let a = FakeResource::new("a").failing_starts(1);

    let _ = r.run(CancellationToken::new(), units![a]).await;

    let after = rec
        .events()
        .into_iter()
        .find(|e| e.kind == EventKind::AfterStart)
        .expect("after start");
    assert!(after.is_failure());
    assert_eq!(after.error.as_deref(), Some("start a failed"));
}

#[tokio::test]
async fn runs_accumulate_and_finish_stops_everything() {
    let (r, _signal) = quiet_runner();
    let journal = Journal::default();
    let first: Vec<UnitRef> = vec![
        FakeResource::with_journal("a", &journal) as UnitRef,
        FakeResource::with_journal("b", &journal) as UnitRef,
    ];
    let second: Vec<UnitRef> = vec![FakeResource::with_journal("c", &journal) as UnitRef];

    r.run(CancellationToken::new(), first).await.expect("first run");
    r.run(CancellationToken::new(), second).await.expect("second run");
    assert_eq!(r.started().await, vec!["a", "b", "c"]);

    r.finish(CancellationToken::new()).await.expect("finish");
    assert_eq!(journal.of("stop"), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn failed_second_run_only_rolls_back_its_own_units() {
    let (r, _signal) = quiet_runner();
    let a = FakeResource::new("a");
    let b = FakeResource::new("b");
    let bad = FakeResource::new("bad").failing_starts(u32::MAX);

    r.run(CancellationToken::new(), units![a])
        .await
        .expect("first run");
    r.run(CancellationToken::new(), units![b, bad])
        .await
        .expect_err("second run fails");

    assert_eq!(b.stop_calls(), 1);
    assert_eq!(a.stop_calls(), 0);
    assert_eq!(r.started().await, vec!["a"]);
}

#[tokio::test]
async fn retried_resource_recovers_inside_a_run() {
    let (r, _signal) = quiet_runner();
    let flaky = FakeResource::new("flaky").failing_starts(2);
    let wrapped = RetrierBuilder::default()
        .attempts(3)
        .backoff(crate::policies::BackoffPolicy::constant(Duration::from_millis(1)))
        .build(flaky.clone());

    r.run(CancellationToken::new(), vec![wrapped])
        .await
        .expect("recovers on third attempt");

    assert_eq!(flaky.start_calls(), 3);
    assert_eq!(r.started().await, vec!["flaky"]);
}
