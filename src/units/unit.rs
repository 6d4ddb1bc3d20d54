//! # Unit contracts.
//!
//! A unit is anything handed to the [`Runner`](crate::Runner). What the runner does with it
//! depends on the capabilities it exposes through [`Unit`]:
//!
//! | Capability       | Trait            | Runner behavior                                     |
//! |------------------|------------------|-----------------------------------------------------|
//! | resource         | [`Resource`]     | started in order, stopped in reverse by `finish`    |
//! | server           | [`Server`]       | `listen` spawned concurrently, `close`d on shutdown |
//! | configurable     | [`Configurable`] | `load` runs once before the unit starts             |
//!
//! A unit exposing neither `Resource` nor `Server` is rejected as not startable.
//! When a unit exposes both, it is treated as a resource.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{Configurable, Resource, Unit, UnitError};
//!
//! struct Database;
//!
//! impl Unit for Database {
//!     fn name(&self) -> &str { "database" }
//!     fn as_resource(&self) -> Option<&dyn Resource> { Some(self) }
//!     fn as_configurable(&self) -> Option<&dyn Configurable> { Some(self) }
//! }
//!
//! #[async_trait]
//! impl Configurable for Database {
//!     async fn load(&self, _ctx: CancellationToken) -> Result<(), UnitError> { Ok(()) }
//! }
//!
//! #[async_trait]
//! impl Resource for Database {
//!     async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError> {
//!         if ctx.is_cancelled() {
//!             return Err(UnitError::Canceled);
//!         }
//!         Ok(())
//!     }
//!
//!     async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> { Ok(()) }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::UnitError;

/// Shared handle to a unit.
pub type UnitRef = Arc<dyn Unit>;

/// A named unit with optional capabilities.
///
/// Every capability query defaults to `None`; implement the ones your type supports
/// by returning `Some(self)`.
pub trait Unit: Send + Sync + 'static {
    /// Returns a stable, human-readable name (e.g. "postgres connection").
    fn name(&self) -> &str;

    /// Resource capability, if any.
    fn as_resource(&self) -> Option<&dyn Resource> {
        None
    }

    /// Server capability, if any.
    fn as_server(&self) -> Option<&dyn Server> {
        None
    }

    /// Configurable capability, if any.
    fn as_configurable(&self) -> Option<&dyn Configurable> {
        None
    }
}

/// Unit with an ordered, blocking start/stop lifecycle.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Starts the resource and returns once it is ready.
    ///
    /// Cancellation of `ctx` is advisory: the runner waits for this call to return
    /// before it rolls anything back.
    async fn start(&self, ctx: CancellationToken) -> Result<(), UnitError>;

    /// Stops the resource and returns once it is released.
    async fn stop(&self, ctx: CancellationToken) -> Result<(), UnitError>;
}

/// Unit whose `listen` blocks for its entire active lifetime.
#[async_trait]
pub trait Server: Send + Sync {
    /// Serves until [`close`](Server::close) is called or a failure occurs.
    ///
    /// A second call while already listening must fail with [`UnitError::AlreadyListening`].
    /// Returning [`UnitError::Canceled`] is treated as a clean exit.
    async fn listen(&self, ctx: CancellationToken) -> Result<(), UnitError>;

    /// Makes a running `listen` return. Must succeed if the server never listened.
    async fn close(&self, ctx: CancellationToken) -> Result<(), UnitError>;
}

/// Unit that needs a load step before it starts.
#[async_trait]
pub trait Configurable: Send + Sync {
    /// Loads configuration. Invoked at most once per start, before `start`/`listen`.
    async fn load(&self, ctx: CancellationToken) -> Result<(), UnitError>;
}
