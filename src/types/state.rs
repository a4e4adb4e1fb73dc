//! The settlement state of a promise.

use core::fmt;
use serde::Serialize;

/// Where a promise is in its lifecycle.
///
/// `Pending` is left at most once and never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseState {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with a rejection cause.
    Rejected,
    /// Settled by its producer after honouring a cancel request.
    Cancelled,
}

impl PromiseState {
    /// Returns true for every state except `Pending`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the state carries a rejection cause.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
