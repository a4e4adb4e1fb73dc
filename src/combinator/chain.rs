//! Chaining combinators: `then`, `catch`, `finally`, `map` and friends.
//!
//! Every combinator creates a downstream promise in the source's context,
//! inheriting the source's name, and wires it with a resolve/reject
//! continuation pair. A fault raised by a user callback (an `Err` or a panic)
//! rejects that downstream promise; the source is never touched.
//!
//! Rejections flow through `then`, `map` and `and_then` unchanged. `catch`
//! observes a rejection and re-raises the same cause; it does not recover.
//!
//! ```
//! use settle::{Error, Promise, PromiseContext, PromiseState};
//!
//! let ctx = PromiseContext::default();
//! let source: Promise<u32> = Promise::new(&ctx);
//! let doubled = source.map(|v| Ok(v * 2)).catch(|_| Ok(()));
//!
//! source.resolve(21)?;
//! assert_eq!(doubled.value(), Some(42));
//!
//! let failed: Promise<u32> = Promise::rejected(&ctx, Error::user("offline"));
//! let observed = failed.catch(|e| {
//!     assert_eq!(e.message(), Some("offline"));
//!     Ok(())
//! });
//! assert_eq!(observed.state(), PromiseState::Rejected);
//! # Ok::<(), Error>(())
//! ```

use crate::context::{PromiseContext, UnhandledRejection};
use crate::error::{Error, Result};
use crate::promise::dispatch::{FaultTarget, Handler};
use crate::promise::Promise;
use crate::tracing_compat::trace;
use crate::types::PromiseId;

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Runs `on_resolved` with the value, then resolves the returned promise
    /// with the same value.
    pub fn then<F>(&self, on_resolved: F) -> Self
    where
        F: FnOnce(&T) -> Result<()> + Send + 'static,
    {
        let downstream = self.derived();
        let (resolve_into, reject_into) = (downstream.clone(), downstream.clone());
        self.action_handlers(
            &downstream,
            move |value| {
                on_resolved(&value)?;
                resolve_into.resolve(value)
            },
            move |cause| reject_into.reject(cause),
        );
        downstream
    }

    /// Two-armed `then`. The rejection arm observes the cause, which is then
    /// re-raised to the returned promise.
    pub fn then_with<F, G>(&self, on_resolved: F, on_rejected: G) -> Self
    where
        F: FnOnce(&T) -> Result<()> + Send + 'static,
        G: FnOnce(&Error) -> Result<()> + Send + 'static,
    {
        let downstream = self.derived();
        let (resolve_into, reject_into) = (downstream.clone(), downstream.clone());
        self.action_handlers(
            &downstream,
            move |value| {
                on_resolved(&value)?;
                resolve_into.resolve(value)
            },
            move |cause| {
                on_rejected(&cause)?;
                reject_into.reject(cause)
            },
        );
        downstream
    }

    /// Transforms the resolved value, possibly into another type.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let downstream = self.derived();
        let (resolve_into, reject_into) = (downstream.clone(), downstream.clone());
        self.action_handlers(
            &downstream,
            move |value| resolve_into.resolve(f(value)?),
            move |cause| reject_into.reject(cause),
        );
        downstream
    }

    /// Chains a promise-returning step. The returned promise settles the way
    /// the inner promise does.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Promise<U>> + Send + 'static,
    {
        let downstream = self.derived();
        let (forward_into, reject_into) = (downstream.clone(), downstream.clone());
        self.action_handlers(
            &downstream,
            move |value| {
                forward(&f(value)?, &forward_into);
                Ok(())
            },
            move |cause| reject_into.reject(cause),
        );
        downstream
    }

    /// Observes a rejection without recovering from it.
    ///
    /// The returned promise resolves with the source value, or rejects with
    /// the source cause after `on_rejected` ran. A fault in `on_rejected`
    /// replaces the cause.
    pub fn catch<F>(&self, on_rejected: F) -> Self
    where
        F: FnOnce(&Error) -> Result<()> + Send + 'static,
    {
        let downstream = self.derived();
        let (resolve_into, reject_into) = (downstream.clone(), downstream.clone());
        self.action_handlers(
            &downstream,
            move |value| resolve_into.resolve(value),
            move |cause| {
                on_rejected(&cause)?;
                reject_into.reject(cause)
            },
        );
        downstream
    }

    /// Runs `on_complete` once the source settles either way.
    ///
    /// The returned promise reflects `on_complete` only; the source's value
    /// or cause is not passed on.
    pub fn finally<F>(&self, on_complete: F) -> Promise<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.completion().then(move |_| on_complete())
    }

    /// Promise-returning form of [`finally`](Self::finally).
    pub fn finally_then<U, F>(&self, on_complete: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce() -> Result<Promise<U>> + Send + 'static,
    {
        self.completion().and_then(move |()| on_complete())
    }

    /// Resolves with unit whichever way the source settles.
    fn completion(&self) -> Promise<()> {
        let completed: Promise<()> = self.derived();
        let (on_value, on_cause) = (completed.clone(), completed.clone());
        self.action_handlers(
            &completed,
            move |_| on_value.resolve(()),
            move |_| on_cause.resolve(()),
        );
        completed
    }

    /// Ends the chain. A rejection is delivered to the context's
    /// unhandled-rejection sink.
    ///
    /// # Panics
    ///
    /// With no handler installed and [`UnhandledPolicy::Panic`] configured,
    /// the sink panics on the thread that settles this promise (or on this
    /// thread, if it already settled). The panic is raised from the
    /// settling call once every other continuation of that settlement fired.
    ///
    /// [`UnhandledPolicy::Panic`]: crate::UnhandledPolicy::Panic
    pub fn done(&self) {
        self.done_with(|_| Ok(()));
    }

    /// Ends the chain with a final resolve continuation. A rejection, or a
    /// fault raised by `on_resolved`, reaches the unhandled-rejection sink.
    ///
    /// # Panics
    ///
    /// See [`done`](Self::done).
    pub fn done_with<F>(&self, on_resolved: F)
    where
        F: FnOnce(T) -> Result<()> + Send + 'static,
    {
        let sink = UnhandledSink {
            ctx: self.context().clone(),
            promise_id: self.id(),
            name: self.name().as_deref().map(str::to_string),
        };
        let promise_id = self.id();
        self.subscribe(
            Handler::new(on_resolved, Box::new(sink.clone())),
            Handler::new(
                move |cause: Error| {
                    if cause.is_cancelled() {
                        trace!(promise_id = %promise_id, "cancellation reached done, not reported");
                        let _ = promise_id;
                        return Ok(());
                    }
                    Err(cause)
                },
                Box::new(sink),
            ),
        );
    }
}

/// Drives `downstream` with the outcome of `inner`.
fn forward<U>(inner: &Promise<U>, downstream: &Promise<U>)
where
    U: Clone + Send + 'static,
{
    let (resolve_into, reject_into) = (downstream.clone(), downstream.clone());
    inner.action_handlers(
        downstream,
        move |value| resolve_into.resolve(value),
        move |cause| reject_into.reject(cause),
    );
}

/// Fault target of terminal `done` continuations.
#[derive(Clone)]
struct UnhandledSink {
    ctx: PromiseContext,
    promise_id: PromiseId,
    name: Option<String>,
}

impl FaultTarget for UnhandledSink {
    fn receive_fault(&self, fault: Error) {
        self.ctx.report_unhandled(&UnhandledRejection {
            promise_id: self.promise_id,
            name: self.name.clone(),
            error: fault,
        });
    }
}
