//! Combinators over promises.
//!
//! - [`chain`]: `then`, `catch`, `finally`, `map`, `and_then` and the
//!   terminal `done`, as inherent methods on [`Promise`](crate::Promise)
//! - [`all`](mod@all): wait for every input, fail fast
//! - [`race`](mod@race): first settlement wins, losers are cancelled
//! - [`sequence`](mod@sequence): run promise-returning steps in order

pub mod all;
pub mod chain;
pub mod race;
pub mod sequence;

pub use all::all;
pub use race::race;
pub use sequence::{sequence, Step};
