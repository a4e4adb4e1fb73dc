//! The context every promise is created in.
//!
//! A [`PromiseContext`] replaces process-wide mutable state with an explicit,
//! injectable object. It owns:
//!
//! - the id allocator handing out [`PromiseId`]s
//! - the opt-in [`PendingRegistry`] of promises that have not settled
//! - the unhandled-rejection sink used by `Promise::done`
//!
//! Contexts are cheap to clone; clones share all state. Promises derived by
//! chaining or aggregation always live in the context of their source.
//!
//! # Example
//!
//! ```
//! use settle::{PromiseConfig, PromiseContext, UnhandledPolicy};
//!
//! let ctx = PromiseContext::new(
//!     PromiseConfig::default()
//!         .with_track_pending(true)
//!         .with_unhandled_policy(UnhandledPolicy::Log),
//! );
//! let report = ctx.shutdown();
//! assert!(report.is_clean());
//! ```

pub mod registry;

pub use registry::{PendingPromise, PendingRegistry};

use crate::config::{ConfigError, PromiseConfig, UnhandledPolicy};
use crate::error::Error;
use crate::promise::dispatch::raise_fatal;
use crate::tracing_compat::{error, info, warn};
use crate::types::{IdAllocator, PromiseId};
use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;

/// A rejection that reached a terminal `done` without being consumed.
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    /// The promise `done` was called on.
    pub promise_id: PromiseId,
    /// Its diagnostic label.
    pub name: Option<String>,
    /// The rejection cause.
    pub error: Error,
}

impl fmt::Display for UnhandledRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled rejection in {}", self.promise_id)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Callback receiving unhandled rejections.
pub type UnhandledHandler = Arc<dyn Fn(&UnhandledRejection) + Send + Sync>;

/// What was still pending when a context was shut down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Promises that never settled, oldest id first.
    pub leaked: Vec<PendingPromise>,
}

impl ShutdownReport {
    /// Returns true if every tracked promise settled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }
}

struct ContextInner {
    config: PromiseConfig,
    ids: IdAllocator,
    registry: PendingRegistry,
    unhandled: RwLock<Option<UnhandledHandler>>,
}

/// Shared state for a family of promises.
#[derive(Clone)]
pub struct PromiseContext {
    inner: Arc<ContextInner>,
}

impl PromiseContext {
    /// Creates a context from a configuration.
    #[must_use]
    pub fn new(config: PromiseConfig) -> Self {
        info!(
            track_pending = config.track_pending,
            unhandled_policy = %config.unhandled_policy,
            "promise context created"
        );
        Self {
            inner: Arc::new(ContextInner {
                registry: PendingRegistry::new(config.track_pending),
                ids: IdAllocator::new(),
                unhandled: RwLock::new(None),
                config,
            }),
        }
    }

    /// Creates a context from defaults plus `SETTLE_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(PromiseConfig::from_env()?))
    }

    /// Returns the configuration this context was created with.
    #[must_use]
    pub fn config(&self) -> &PromiseConfig {
        &self.inner.config
    }

    /// Allocates the next promise id.
    pub fn next_id(&self) -> PromiseId {
        self.inner.ids.next_id()
    }

    /// Returns the pending registry.
    #[must_use]
    pub fn registry(&self) -> &PendingRegistry {
        &self.inner.registry
    }

    /// Number of tracked promises still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Snapshot of tracked pending promises, oldest id first.
    #[must_use]
    pub fn pending_promises(&self) -> Vec<PendingPromise> {
        self.inner.registry.snapshot()
    }

    /// Tracked promises pending longer than the configured `stale_after`.
    #[must_use]
    pub fn stale_pending(&self) -> Vec<PendingPromise> {
        self.inner.registry.older_than(self.inner.config.stale_after)
    }

    /// Installs the callback invoked for unhandled rejections, replacing the
    /// configured default behaviour.
    pub fn set_unhandled_rejection_handler(
        &self,
        handler: impl Fn(&UnhandledRejection) + Send + Sync + 'static,
    ) {
        *self.inner.unhandled.write() = Some(Arc::new(handler));
    }

    /// Restores the configured default unhandled-rejection behaviour.
    pub fn clear_unhandled_rejection_handler(&self) {
        *self.inner.unhandled.write() = None;
    }

    /// Delivers a rejection nothing consumed.
    ///
    /// # Panics
    ///
    /// Panics when no handler is installed and the policy is
    /// [`UnhandledPolicy::Panic`]. When called from inside a continuation,
    /// the panic is held until the settling call has fired every handler,
    /// then raised from that call. Continuation guards never absorb it.
    pub fn report_unhandled(&self, rejection: &UnhandledRejection) {
        let handler = self.inner.unhandled.read().clone();
        if let Some(handler) = handler {
            handler(rejection);
            return;
        }
        error!(
            promise_id = %rejection.promise_id,
            name = ?rejection.name,
            error = %rejection.error,
            "unhandled promise rejection"
        );
        if self.inner.config.unhandled_policy == UnhandledPolicy::Panic {
            raise_fatal(rejection.to_string());
        }
    }

    /// Tears the context down: stops tracking and reports leaked promises.
    ///
    /// Promises may still be created and settled afterwards; they are simply
    /// no longer tracked.
    #[must_use = "the report lists promises that never settled"]
    pub fn shutdown(&self) -> ShutdownReport {
        let leaked = self.inner.registry.drain();
        for promise in &leaked {
            warn!(
                promise_id = %promise.id,
                name = ?promise.name,
                age_ms = promise.age.as_millis(),
                "promise still pending at context shutdown"
            );
            let _ = promise;
        }
        info!(
            allocated = self.inner.ids.allocated(),
            leaked = leaked.len(),
            "promise context shut down"
        );
        ShutdownReport { leaked }
    }

    /// Returns true if both handles refer to the same context.
    #[must_use]
    pub fn same_context(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for PromiseContext {
    fn default() -> Self {
        Self::new(PromiseConfig::default())
    }
}

impl fmt::Debug for PromiseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseContext")
            .field("config", &self.inner.config)
            .field("allocated", &self.inner.ids.allocated())
            .field("pending", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}
