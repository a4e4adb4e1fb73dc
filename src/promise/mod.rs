//! The settlement cell.
//!
//! A [`Promise<T>`] is settled at most once, by `resolve`, `reject` or
//! `settle_cancelled`. Continuations registered while it is pending are
//! queued in registration order; once it settles they fire exactly once and
//! the queues are dropped. Continuations registered after settlement run
//! synchronously, inside the registration call, with the known outcome.
//!
//! # Locking
//!
//! The slot (outcome or pending queues) lives behind one mutex, so deciding
//! "append or run now" and the `Pending → terminal` transition are atomic
//! together. Callbacks always run with the lock released; a continuation may
//! freely settle or chain onto any promise, including the one it observes.
//!
//! # Cancellation
//!
//! `cancel` is advisory. It runs the producer's cancel callback (once) and
//! drops the queued continuations, but it does not settle the promise. A
//! producer that honours the request settles with `reject` or
//! `settle_cancelled`.

pub(crate) mod dispatch;
mod resolver;

pub use resolver::{PromiseBuilder, Resolver};

use crate::context::PromiseContext;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{Outcome, PromiseId, PromiseState};
use core::fmt;
use dispatch::{catch_fault, dispatch, FaultTarget, Handler};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub(crate) type CancelCallback = Box<dyn FnOnce() -> Result<()> + Send>;

/// Continuations waiting for a pending promise.
struct Waiters<T> {
    on_resolve: Vec<Handler<T>>,
    on_reject: Vec<Handler<Error>>,
    on_cancel: Option<CancelCallback>,
    cancel_requested: bool,
}

impl<T> Waiters<T> {
    fn new(on_cancel: Option<CancelCallback>) -> Self {
        Self {
            on_resolve: Vec::new(),
            on_reject: Vec::new(),
            on_cancel,
            cancel_requested: false,
        }
    }
}

enum Slot<T> {
    Pending(Waiters<T>),
    Settled(Outcome<T>),
}

struct Cell<T> {
    slot: Slot<T>,
    name: Option<Arc<str>>,
}

struct Inner<T> {
    id: PromiseId,
    ctx: PromiseContext,
    cell: Mutex<Cell<T>>,
}

/// A deferred value settled exactly once.
///
/// Cloning a `Promise` yields another handle to the same cell.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A non-owning handle that does not keep the cell alive.
pub(crate) struct WeakPromise<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakPromise<T> {
    pub(crate) fn upgrade(&self) -> Option<Promise<T>> {
        self.inner.upgrade().map(|inner| Promise { inner })
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending promise.
    #[must_use]
    pub fn new(ctx: &PromiseContext) -> Self {
        Self::create(ctx, None, None)
    }

    /// Creates a promise already resolved with `value`.
    #[must_use]
    pub fn resolved(ctx: &PromiseContext, value: T) -> Self {
        let promise = Self::new(ctx);
        promise.try_resolve(value);
        promise
    }

    /// Creates a promise already rejected with `cause`.
    #[must_use]
    pub fn rejected(ctx: &PromiseContext, cause: Error) -> Self {
        let promise = Self::new(ctx);
        promise.try_reject(cause);
        promise
    }

    /// Creates a promise and runs `init` synchronously with its resolver.
    ///
    /// An `Err` returned by `init`, or a panic inside it, rejects the promise
    /// if it is still pending.
    pub fn from_resolver<F>(ctx: &PromiseContext, init: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<()>,
    {
        Self::builder(ctx).with_resolver(init)
    }

    /// Starts building a promise with a name or a cancel callback.
    #[must_use]
    pub fn builder(ctx: &PromiseContext) -> PromiseBuilder<T> {
        PromiseBuilder::new(ctx)
    }

    pub(crate) fn create(
        ctx: &PromiseContext,
        name: Option<Arc<str>>,
        on_cancel: Option<CancelCallback>,
    ) -> Self {
        let id = ctx.next_id();
        ctx.registry().insert(id, name.clone());
        trace!(promise_id = %id, name = ?name, "promise created");
        Self {
            inner: Arc::new(Inner {
                id,
                ctx: ctx.clone(),
                cell: Mutex::new(Cell {
                    slot: Slot::Pending(Waiters::new(on_cancel)),
                    name,
                }),
            }),
        }
    }

    /// Creates a pending promise in the same context, inheriting the name.
    pub(crate) fn derived<U>(&self) -> Promise<U>
    where
        U: Clone + Send + 'static,
    {
        Promise::create(&self.inner.ctx, self.name(), None)
    }

    // =====================================================================
    // Settlement
    // =====================================================================

    /// Resolves the promise with `value` and fires the resolve continuations.
    ///
    /// Fails with [`ErrorKind::InvalidState`](crate::ErrorKind::InvalidState)
    /// if the promise already settled.
    pub fn resolve(&self, value: T) -> Result<()> {
        self.settle(Outcome::Resolved(value))
            .map_err(|state| self.double_settlement("resolve", state))
    }

    /// Rejects the promise with `cause` and fires the reject continuations.
    ///
    /// Fails with [`ErrorKind::InvalidState`](crate::ErrorKind::InvalidState)
    /// if the promise already settled.
    pub fn reject(&self, cause: Error) -> Result<()> {
        self.settle(Outcome::Rejected(cause))
            .map_err(|state| self.double_settlement("reject", state))
    }

    /// Settles the promise as cancelled.
    ///
    /// Reject continuations fire with an
    /// [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) cause.
    pub fn settle_cancelled(&self) -> Result<()> {
        self.settle(Outcome::Cancelled(Error::cancelled()))
            .map_err(|state| self.double_settlement("cancel", state))
    }

    /// Resolves if still pending. Returns true if this call settled it.
    pub fn try_resolve(&self, value: T) -> bool {
        self.settle(Outcome::Resolved(value)).is_ok()
    }

    /// Rejects if still pending. Returns true if this call settled it.
    pub fn try_reject(&self, cause: Error) -> bool {
        self.settle(Outcome::Rejected(cause)).is_ok()
    }

    /// Performs the one-shot terminal transition and dispatches.
    ///
    /// On failure returns the state the promise had already reached.
    fn settle(&self, outcome: Outcome<T>) -> core::result::Result<(), PromiseState> {
        let waiters = {
            let mut cell = self.inner.cell.lock();
            if let Slot::Settled(existing) = &cell.slot {
                return Err(existing.state());
            }
            let Slot::Pending(waiters) =
                std::mem::replace(&mut cell.slot, Slot::Settled(outcome.clone()))
            else {
                return Err(outcome.state());
            };
            waiters
        };

        self.inner.ctx.registry().remove(self.inner.id);
        trace!(
            promise_id = %self.inner.id,
            state = %outcome.state(),
            resolve_handlers = waiters.on_resolve.len(),
            reject_handlers = waiters.on_reject.len(),
            "promise settled"
        );

        let Waiters {
            on_resolve,
            on_reject,
            ..
        } = waiters;
        match outcome {
            Outcome::Resolved(value) => {
                drop(on_reject);
                dispatch(on_resolve, &value);
            }
            Outcome::Rejected(cause) | Outcome::Cancelled(cause) => {
                drop(on_resolve);
                dispatch(on_reject, &cause);
            }
        }
        Ok(())
    }

    fn double_settlement(&self, op: &str, state: PromiseState) -> Error {
        Error::invalid_state(format!(
            "cannot {op} {}: promise is already {state}",
            self.inner.id
        ))
    }

    // =====================================================================
    // Continuations
    // =====================================================================

    /// Registers a resolve/reject continuation pair whose faults are
    /// redirected into `downstream`.
    ///
    /// If the promise already settled, the matching continuation runs now,
    /// on the calling thread, before this returns.
    pub(crate) fn action_handlers<D, R, J>(&self, downstream: &Promise<D>, on_resolve: R, on_reject: J)
    where
        D: Clone + Send + 'static,
        R: FnOnce(T) -> Result<()> + Send + 'static,
        J: FnOnce(Error) -> Result<()> + Send + 'static,
    {
        self.subscribe(
            Handler::new(on_resolve, Box::new(downstream.clone())),
            Handler::new(on_reject, Box::new(downstream.clone())),
        );
    }

    pub(crate) fn subscribe(&self, on_resolve: Handler<T>, on_reject: Handler<Error>) {
        let settled = {
            let mut cell = self.inner.cell.lock();
            match &mut cell.slot {
                Slot::Pending(waiters) => {
                    waiters.on_resolve.push(on_resolve);
                    waiters.on_reject.push(on_reject);
                    return;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };

        trace!(
            promise_id = %self.inner.id,
            state = %settled.state(),
            "continuation registered after settlement, running now"
        );
        match settled {
            Outcome::Resolved(value) => on_resolve.invoke(value),
            Outcome::Rejected(cause) | Outcome::Cancelled(cause) => on_reject.invoke(cause),
        }
    }

    // =====================================================================
    // Cancellation
    // =====================================================================

    /// Sets the producer's cancel callback, replacing any previous one.
    ///
    /// Ignored once the promise has settled.
    pub fn add_on_cancel<F>(&self, on_cancel: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        if let Slot::Pending(waiters) = &mut self.inner.cell.lock().slot {
            waiters.on_cancel = Some(Box::new(on_cancel));
        }
    }

    /// Requests cancellation.
    ///
    /// If a cancel callback is set it runs (once), then the queued
    /// continuations are dropped. The promise stays pending unless the
    /// callback settles it. A fault raised by the callback rejects the
    /// promise. Returns true if a callback ran.
    pub fn cancel(&self) -> bool {
        let on_cancel = {
            let mut cell = self.inner.cell.lock();
            match &mut cell.slot {
                Slot::Pending(waiters) => {
                    waiters.cancel_requested = true;
                    waiters.on_cancel.take()
                }
                Slot::Settled(_) => None,
            }
        };
        let Some(on_cancel) = on_cancel else {
            return false;
        };

        debug!(promise_id = %self.inner.id, "cancel requested");
        if let Some(fault) = catch_fault(on_cancel) {
            self.receive_fault(fault);
        }

        let dropped = {
            let mut cell = self.inner.cell.lock();
            match &mut cell.slot {
                Slot::Pending(waiters) => Some((
                    std::mem::take(&mut waiters.on_resolve),
                    std::mem::take(&mut waiters.on_reject),
                )),
                Slot::Settled(_) => None,
            }
        };
        if let Some((on_resolve, on_reject)) = dropped {
            trace!(
                promise_id = %self.inner.id,
                resolve_handlers = on_resolve.len(),
                reject_handlers = on_reject.len(),
                "cancelled promise left pending, continuations dropped"
            );
            drop((on_resolve, on_reject));
        }
        true
    }

    /// Returns true while a cancel callback is set and the promise is pending.
    #[must_use]
    pub fn is_cancelable(&self) -> bool {
        matches!(
            &self.inner.cell.lock().slot,
            Slot::Pending(Waiters {
                on_cancel: Some(_),
                ..
            })
        )
    }

    /// Returns true if `cancel` was called while the promise was pending.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        matches!(
            &self.inner.cell.lock().slot,
            Slot::Pending(Waiters {
                cancel_requested: true,
                ..
            })
        )
    }

    // =====================================================================
    // Inspection
    // =====================================================================

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match &self.inner.cell.lock().slot {
            Slot::Pending(_) => PromiseState::Pending,
            Slot::Settled(outcome) => outcome.state(),
        }
    }

    /// Returns true until the promise settles.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Returns the resolved value, if resolved.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &self.inner.cell.lock().slot {
            Slot::Settled(Outcome::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the rejection cause, if rejected or cancelled.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        match &self.inner.cell.lock().slot {
            Slot::Settled(Outcome::Rejected(cause) | Outcome::Cancelled(cause)) => {
                Some(cause.clone())
            }
            _ => None,
        }
    }

    /// Returns the terminal outcome, if settled.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<T>> {
        match &self.inner.cell.lock().slot {
            Slot::Pending(_) => None,
            Slot::Settled(outcome) => Some(outcome.clone()),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakPromise<T> {
        WeakPromise {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T> Promise<T> {
    /// Returns the promise id.
    #[must_use]
    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    /// Returns the context the promise lives in.
    #[must_use]
    pub fn context(&self) -> &PromiseContext {
        &self.inner.ctx
    }

    /// Returns the diagnostic label.
    #[must_use]
    pub fn name(&self) -> Option<Arc<str>> {
        self.inner.cell.lock().name.clone()
    }

    /// Sets the diagnostic label.
    pub fn set_name(&self, name: impl Into<Arc<str>>) {
        let name = name.into();
        self.inner.cell.lock().name = Some(Arc::clone(&name));
        self.inner.ctx.registry().rename(self.inner.id, Some(name));
    }

    /// Sets the diagnostic label and returns the promise.
    #[must_use]
    pub fn with_name(self, name: impl Into<Arc<str>>) -> Self {
        self.set_name(name);
        self
    }

    /// Returns true if both handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> FaultTarget for Promise<T>
where
    T: Clone + Send + 'static,
{
    fn receive_fault(&self, fault: Error) {
        if let Err(state) = self.settle(Outcome::Rejected(fault.clone())) {
            warn!(
                promise_id = %self.inner.id,
                state = %state,
                error = %fault,
                "fault raised after promise settled, dropping it"
            );
            let _ = state;
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.inner.cell.lock();
        let state = match &cell.slot {
            Slot::Pending(_) => PromiseState::Pending,
            Slot::Settled(outcome) => outcome.state(),
        };
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("name", &cell.name)
            .field("state", &state)
            .finish()
    }
}
