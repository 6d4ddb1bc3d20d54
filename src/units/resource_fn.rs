//! # Function-backed resource (`ResourceFn`)
//!
//! [`ResourceFn`] wraps two closures `Fn(CancellationToken) -> Fut`, one for `start`
//! and one for `stop`, producing a fresh future per call.
//!
//! ## Concurrency semantics
//! - Each call creates a **new** future that owns its state.
//! - There is no hidden mutation between calls; share state explicitly with `Arc<...>`
//!   captured by both closures.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{ResourceFn, UnitError, UnitRef};
//!
//! let cache: UnitRef = ResourceFn::arc(
//!     "cache",
//!     |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//!     |_ctx: CancellationToken| async { Ok::<_, UnitError>(()) },
//! );
//!
//! assert_eq!(cache.name(), "cache");
//! assert!(cache.as_resource().is_some());
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;
use crate::units::unit::{Resource, Unit};

/// Function-backed resource implementation.
pub struct ResourceFn<S, T> {
    name: Cow<'static, str>,
    start: S,
    stop: T,
}

impl<S, T> ResourceFn<S, T> {
    /// Creates a new function-backed resource.
    ///
    /// Prefer [`ResourceFn::arc`] when you immediately need a [`UnitRef`](crate::UnitRef).
    pub fn new(name: impl Into<Cow<'static, str>>, start: S, stop: T) -> Self {
        Self {
            name: name.into(),
            start,
            stop,
        }
    }

    /// Creates the resource and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, start: S, stop: T) -> Arc<Self> {
        Arc::new(Self::new(name, start, stop))
    }
}

impl<S, T> std::fmt::Debug for ResourceFn<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFn").field("name", &self.name).finish()
    }
}

impl<S, SFut, T, TFut> Unit for ResourceFn<S, T>
where
    S: Fn(CancellationToken) -> SFut + Send + Sync + 'static,
    SFut: Future<Output = Result<(), UnitError>> + Send + 'static,
    T: Fn(CancellationToken) -> TFut + Send + Sync + 'static,
    TFut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn as_resource(&self) -> Option<&dyn Resource> {
        Some(self)
    }
}

#[async_trait]
impl<S, SFut, T, TFut> Resource for ResourceFn<S, T>
where
    S: Fn(CancellationToken) -> SFut + Send + Sync + 'static,
    SFut: Future<Output = Result<(), UnitError>> + Send + 'static,
    T: Fn(CancellationToken) -> TFut + Send + Sync + 'static,
    TFut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        (self.start)(ctx).await
    }

    async fn stop(&self, ctx: CancellationToken) -> Result<(), UnitError> {
        (self.stop)(ctx).await
    }
}
