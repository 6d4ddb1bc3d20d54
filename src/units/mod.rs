//! # Units: contracts, function-backed resources, and the retrier.
//!
//! This module provides the unit-related types:
//! - [`Unit`] - named entity with capability queries
//! - [`Resource`], [`Server`], [`Configurable`] - the capabilities
//! - [`UnitRef`] - shared reference to a unit (`Arc<dyn Unit>`)
//! - [`ResourceFn`] - closure-backed resource
//! - [`Retrier`] / [`RetrierBuilder`] / [`RetryPolicy`] - retrying decorator

mod resource_fn;
mod retrier;
mod unit;

pub use resource_fn::ResourceFn;
pub use retrier::{Retrier, RetrierBuilder, RetryPolicy};
pub use unit::{Configurable, Resource, Server, Unit, UnitRef};
