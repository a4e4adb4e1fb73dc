//! Identifier types for promises.
//!
//! Ids are allocated by the [`PromiseContext`](crate::PromiseContext) that
//! creates a promise. They order promises by creation and are used for
//! diagnostics only, never for value equality.

use core::fmt;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a promise within its context.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PromiseId(u64);

impl PromiseId {
    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Creates a promise ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromiseId({})", self.0)
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Monotonic id source. The first id handed out is `P1`.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    pub fn next_id(&self) -> PromiseId {
        PromiseId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns how many ids have been handed out.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
