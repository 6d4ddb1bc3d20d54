//! # Retrier: retry/backoff/timeout decorator for a unit's start.
//!
//! [`Retrier`] wraps a [`UnitRef`] and replaces its resource `start` with a retry loop
//! governed by a [`RetryPolicy`]. Everything else is forwarded unchanged: the name,
//! `stop`, the server capability, and the configurable capability (`load` is never retried).
//!
//! ## Flow
//! ```text
//! start(ctx)
//!   deadline = now + policy.timeout (optional, spans all attempts)
//!   loop {
//!     ├─► deadline passed / ctx cancelled ─► AfterGiveUp, Err(Timeout | Canceled)
//!     ├─► attempt += 1  (attempt > 1 ─► BeforeRetry)
//!     ├─► inner.start(token)  (deadline ─► cancel token, wait for the attempt to return)
//!     │     ├─ Ok  ─► return Ok
//!     │     └─ Err ─► AfterStart{error}
//!     ├─► attempts exhausted ─► AfterGiveUp, Err(ExhaustedAttempts)
//!     └─► RetryScheduled{delay} ─► sleep(backoff.next(attempt - 1))  (cancellable)
//!   }
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{BackoffPolicy, ResourceFn, Retrier, UnitError, UnitRef};
//!
//! let db: UnitRef = ResourceFn::arc(
//!     "postgres",
//!     |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!     |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//! );
//!
//! let db = Retrier::builder()
//!     .attempts(5)
//!     .backoff(BackoffPolicy { factor: 2.0, ..BackoffPolicy::default() })
//!     .timeout(Duration::from_secs(30))
//!     .build(db);
//!
//! assert_eq!(db.name(), "postgres");
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::UnitError,
    events::{Event, EventKind},
    policies::BackoffPolicy,
    reporters::{Report, ReporterSet},
    units::unit::{Configurable, Resource, Server, Unit, UnitRef},
};

/// Options of a [`Retrier`].
///
/// ## Sentinel values
/// - `attempts = None` → retry until success, cancellation or timeout
/// - `attempts = Some(0)` → treated as `Some(1)`
/// - `timeout = None` or `Some(0s)` → no overall deadline
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of start attempts (`None` = unbounded).
    pub attempts: Option<u32>,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Hard upper bound across all attempts.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Effective attempt limit.
    #[inline]
    pub fn attempt_limit(&self) -> Option<u32> {
        self.attempts.map(|n| n.max(1))
    }

    /// Effective overall timeout.
    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout.filter(|d| !d.is_zero())
    }
}

impl Default for RetryPolicy {
    /// Default policy:
    ///
    /// - `attempts = 3`
    /// - `backoff = BackoffPolicy::default()` (constant 100ms)
    /// - `timeout = None`
    fn default() -> Self {
        Self {
            attempts: Some(3),
            backoff: BackoffPolicy::default(),
            timeout: None,
        }
    }
}

/// Builder for [`Retrier`] wrappers.
///
/// One builder can wrap any number of units; each gets its own copy of the policy.
#[derive(Clone, Debug, Default)]
pub struct RetrierBuilder {
    policy: RetryPolicy,
    reporters: ReporterSet,
}

impl RetrierBuilder {
    /// Creates a builder from an explicit policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            reporters: ReporterSet::empty(),
        }
    }

    /// Sets the maximum number of attempts.
    pub fn attempts(mut self, n: u32) -> Self {
        self.policy.attempts = Some(n);
        self
    }

    /// Retries until success, cancellation or timeout.
    pub fn unbounded(mut self) -> Self {
        self.policy.attempts = None;
        self
    }

    /// Sets the backoff between attempts.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Sets the overall timeout across all attempts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    /// Sets reporters notified about retries and give-ups.
    pub fn with_reporters(mut self, reporters: Vec<Arc<dyn Report>>) -> Self {
        self.reporters = ReporterSet::new(reporters);
        self
    }

    /// Shares an existing reporter set (e.g. the runner's).
    pub fn with_reporter_set(mut self, reporters: ReporterSet) -> Self {
        self.reporters = reporters;
        self
    }

    /// Returns the policy the builder will apply.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Wraps `unit`, returning a unit with the same name and capabilities.
    pub fn build(&self, unit: UnitRef) -> UnitRef {
        Arc::new(Retrier {
            inner: unit,
            policy: self.policy,
            reporters: self.reporters.clone(),
        })
    }
}

/// Unit decorator retrying the wrapped resource's `start`.
pub struct Retrier {
    inner: UnitRef,
    policy: RetryPolicy,
    reporters: ReporterSet,
}

impl Retrier {
    /// Returns a builder with [`RetryPolicy::default`].
    pub fn builder() -> RetrierBuilder {
        RetrierBuilder::default()
    }

    /// Wraps `unit` with `policy` and no reporters.
    pub fn new(unit: UnitRef, policy: RetryPolicy) -> Self {
        Self {
            inner: unit,
            policy,
            reporters: ReporterSet::empty(),
        }
    }

    /// The wrapped unit.
    pub fn inner(&self) -> &UnitRef {
        &self.inner
    }

    /// Why the loop must stop now, if it must.
    fn interrupted(&self, ctx: &CancellationToken, deadline: Option<Instant>) -> Option<UnitError> {
        if let (Some(at), Some(timeout)) = (deadline, self.policy.deadline()) {
            if Instant::now() >= at {
                return Some(UnitError::Timeout { timeout });
            }
        }
        if ctx.is_cancelled() {
            return Some(UnitError::Canceled);
        }
        None
    }

    /// Runs one attempt; on deadline the token is cancelled and the attempt is awaited.
    async fn attempt(
        &self,
        res: &dyn Resource,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), UnitError> {
        let fut = res.start(token.clone());
        tokio::pin!(fut);

        match deadline {
            Some(at) => {
                tokio::select! {
                    r = &mut fut => r,
                    _ = time::sleep_until(at) => {
                        token.cancel();
                        fut.await
                    }
                }
            }
            None => fut.await,
        }
    }

    /// Sleeps before the next attempt; wakes early on cancellation or deadline.
    async fn pause(&self, delay: Duration, token: &CancellationToken, deadline: Option<Instant>) {
        let wake = match deadline {
            Some(at) => at.min(Instant::now() + delay),
            None => Instant::now() + delay,
        };
        tokio::select! {
            _ = time::sleep_until(wake) => {}
            _ = token.cancelled() => {}
        }
    }

    fn give_up(&self, attempt: u32, err: &UnitError) -> UnitError {
        self.reporters.emit(
            &Event::new(EventKind::AfterGiveUp)
                .with_unit(self.inner.name())
                .with_attempt(attempt)
                .with_error(err.to_string()),
        );
        err.clone()
    }
}

impl Unit for Retrier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn as_resource(&self) -> Option<&dyn Resource> {
        self.inner.as_resource().map(|_| self as &dyn Resource)
    }

    fn as_server(&self) -> Option<&dyn Server> {
        self.inner.as_server()
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        self.inner.as_configurable()
    }
}

#[async_trait]
impl Resource for Retrier {
    async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        let Some(res) = self.inner.as_resource() else {
            return Ok(());
        };
        let token = ctx.child_token();
        let deadline = self.policy.deadline().map(|d| Instant::now() + d);
        let limit = self.policy.attempt_limit();
        let name = self.inner.name();
        let mut attempt: u32 = 0;

        loop {
            if let Some(err) = self.interrupted(&ctx, deadline) {
                return Err(self.give_up(attempt, &err));
            }

            attempt += 1;
            if attempt > 1 {
                self.reporters.emit(
                    &Event::new(EventKind::BeforeRetry)
                        .with_unit(name)
                        .with_attempt(attempt),
                );
            }

            let err = match self.attempt(res, &token, deadline).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            self.reporters.emit(
                &Event::new(EventKind::AfterStart)
                    .with_unit(name)
                    .with_attempt(attempt)
                    .with_error(err.to_string()),
            );

            if let Some(stop) = self.interrupted(&ctx, deadline) {
                return Err(self.give_up(attempt, &stop));
            }
            if limit.is_some_and(|max| attempt >= max) {
                let exhausted = UnitError::ExhaustedAttempts {
                    attempts: attempt,
                    error: err.to_string(),
                };
                return Err(self.give_up(attempt, &exhausted));
            }

            let delay = self.policy.backoff.next(attempt - 1);
            self.reporters.emit(
                &Event::new(EventKind::RetryScheduled)
                    .with_unit(name)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_error(err.to_string()),
            );
            self.pause(delay, &token, deadline).await;
        }
    }

    async fn stop(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        match self.inner.as_resource() {
            Some(res) => res.stop(ctx).await,
            None => Ok(()),
        }
    }
}
