//! Registry of promises that have not settled yet.
//!
//! Opt-in diagnostics: a promise is recorded when it is created and removed
//! on its terminal transition. Anything still listed long after creation is
//! either slow or leaked (dropped by every holder without being settled).

use crate::types::PromiseId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot of one pending promise.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPromise {
    /// Promise identifier.
    pub id: PromiseId,
    /// Diagnostic label, if one was set.
    pub name: Option<String>,
    /// When the promise was created.
    #[serde(skip)]
    pub created_at: Instant,
    /// Time spent pending when the snapshot was taken.
    pub age: Duration,
}

#[derive(Debug)]
struct Entry {
    name: Option<Arc<str>>,
    created_at: Instant,
}

impl Entry {
    fn snapshot(&self, id: PromiseId, now: Instant) -> PendingPromise {
        PendingPromise {
            id,
            name: self.name.as_deref().map(str::to_string),
            created_at: self.created_at,
            age: now.saturating_duration_since(self.created_at),
        }
    }
}

/// Set of currently pending promises, ordered by id.
#[derive(Debug)]
pub struct PendingRegistry {
    enabled: AtomicBool,
    entries: Mutex<BTreeMap<PromiseId, Entry>>,
}

impl PendingRegistry {
    /// Creates a registry; a disabled registry records nothing.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns true if new promises are being recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Records a freshly created promise.
    pub fn insert(&self, id: PromiseId, name: Option<Arc<str>>) {
        if !self.is_enabled() {
            return;
        }
        self.entries.lock().insert(
            id,
            Entry {
                name,
                created_at: Instant::now(),
            },
        );
    }

    /// Updates the label of a recorded promise.
    pub fn rename(&self, id: PromiseId, name: Option<Arc<str>>) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.name = name;
        }
    }

    /// Forgets a promise that left `Pending`. Returns true if it was recorded.
    pub fn remove(&self, id: PromiseId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    /// Number of recorded promises.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of every recorded promise, oldest id first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingPromise> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| entry.snapshot(*id, now))
            .collect()
    }

    /// Snapshot of promises pending for at least `threshold`.
    #[must_use]
    pub fn older_than(&self, threshold: Duration) -> Vec<PendingPromise> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| entry.snapshot(*id, now))
            .filter(|p| p.age >= threshold)
            .collect()
    }

    /// Stops recording and returns whatever was still pending.
    pub fn drain(&self) -> Vec<PendingPromise> {
        self.enabled.store(false, Ordering::Release);
        let now = Instant::now();
        let entries = std::mem::take(&mut *self.entries.lock());
        entries
            .iter()
            .map(|(id, entry)| entry.snapshot(*id, now))
            .collect()
    }
}
