//! Settle: deferred values that are settled exactly once.
//!
//! # Overview
//!
//! A [`Promise<T>`] is a cell that a producer resolves with a value or
//! rejects with an [`Error`], once. Consumers chain continuations onto it
//! before or after that happens without losing ordering or leaking state.
//!
//! # Core Guarantees
//!
//! - **At-most-once settlement**: a second `resolve`/`reject` fails with
//!   [`ErrorKind::InvalidState`]; the state never returns to pending
//! - **Exactly-once dispatch**: every continuation fires once, in
//!   registration order, whether registered before or after settlement
//! - **Fault containment**: an `Err` or panic inside a continuation rejects
//!   the downstream promise of that chain step, never the source
//! - **Cooperative cancellation**: `cancel` notifies the producer; `race`
//!   fans it out to every losing input
//! - **No ambient globals**: ids, diagnostics and the unhandled-rejection
//!   sink live in an explicit [`PromiseContext`]
//!
//! # Example
//!
//! ```
//! use settle::{all, Promise, PromiseContext};
//! use std::thread;
//!
//! let ctx = PromiseContext::default();
//! let mut workers = Vec::new();
//! let parts: Vec<Promise<u32>> = (1..=3)
//!     .map(|n| {
//!         Promise::from_resolver(&ctx, |resolver| {
//!             workers.push(thread::spawn(move || resolver.resolve(n * 10)));
//!             Ok(())
//!         })
//!     })
//!     .collect();
//!
//! let total = all(&ctx, parts).map(|values| Ok(values.iter().sum::<u32>()));
//! for worker in workers {
//!     worker.join().unwrap().unwrap();
//! }
//! assert_eq!(total.value(), Some(60));
//! ```
//!
//! # Module Structure
//!
//! - [`promise`]: the settlement cell, [`Resolver`] and [`PromiseBuilder`]
//! - [`combinator`]: `then`/`catch`/`finally`/`map`, [`all`], [`race`],
//!   [`sequence`]
//! - [`context`]: id allocation, pending registry, unhandled-rejection sink
//! - [`config`]: [`PromiseConfig`] with environment and TOML loading
//! - [`types`]: identifiers, states and outcomes
//! - [`error`]: error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod combinator;
pub mod config;
pub mod context;
pub mod error;
pub mod promise;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use combinator::{all, race, sequence, Step};
pub use config::{ConfigError, PromiseConfig, UnhandledPolicy};
pub use context::{
    PendingPromise, PromiseContext, ShutdownReport, UnhandledHandler, UnhandledRejection,
};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use promise::{Promise, PromiseBuilder, Resolver};
pub use types::{Outcome, PromiseId, PromiseState};
