//! Core types shared by promises, the context and the combinators.
//!
//! - [`id`]: `PromiseId`, the per-context monotonically increasing identifier
//! - [`state`]: the four-valued `PromiseState`
//! - [`outcome`]: `Outcome<T>`, a terminal result snapshot

pub mod id;
pub mod outcome;
pub mod state;

pub use id::{IdAllocator, PromiseId};
pub use outcome::Outcome;
pub use state::PromiseState;
