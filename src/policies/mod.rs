//! Retry delay policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays between start attempts evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! RetryPolicy { attempts, backoff: BackoffPolicy, timeout }
//!      └─► Retrier sleeps backoff.next(attempt - 1) after each failed attempt
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
