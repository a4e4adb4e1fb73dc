//! Terminal outcome of a promise.
//!
//! `Outcome<T>` is the snapshot returned by `Promise::outcome` once a promise
//! has left `Pending`:
//!
//! - `Resolved(T)`: settled with a value
//! - `Rejected(Error)`: settled with a rejection cause
//! - `Cancelled(Error)`: settled by a producer honouring a cancel request

use crate::error::Error;
use crate::types::PromiseState;

/// The terminal outcome of a promise.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Settled with a value.
    Resolved(T),
    /// Settled with a rejection cause.
    Rejected(Error),
    /// Settled as cancelled.
    Cancelled(Error),
}

impl<T> Outcome<T> {
    /// Returns the state this outcome corresponds to.
    #[must_use]
    pub const fn state(&self) -> PromiseState {
        match self {
            Self::Resolved(_) => PromiseState::Resolved,
            Self::Rejected(_) => PromiseState::Rejected,
            Self::Cancelled(_) => PromiseState::Cancelled,
        }
    }

    /// Returns true if this outcome is `Resolved`.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Returns true if this outcome is `Rejected`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Converts this outcome to a standard Result.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Resolved(v) => Ok(v),
            Self::Rejected(e) | Self::Cancelled(e) => Err(e),
        }
    }

    /// Maps the resolved value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Resolved(v) => Outcome::Resolved(f(v)),
            Self::Rejected(e) => Outcome::Rejected(e),
            Self::Cancelled(e) => Outcome::Cancelled(e),
        }
    }
}
