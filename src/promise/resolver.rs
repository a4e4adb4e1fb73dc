//! Producer-side handles: [`Resolver`] and [`PromiseBuilder`].

use super::dispatch::catch_fault;
use super::{CancelCallback, Promise};
use crate::context::PromiseContext;
use crate::error::{Error, Result};
use crate::tracing_compat::warn;
use std::sync::Arc;

/// The settling half handed to a promise initializer.
///
/// Cheap to clone and `Send`, so it can be moved into a worker thread that
/// settles the promise later.
pub struct Resolver<T> {
    promise: Promise<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T> Resolver<T>
where
    T: Clone + Send + 'static,
{
    /// Resolves the promise. See [`Promise::resolve`].
    pub fn resolve(&self, value: T) -> Result<()> {
        self.promise.resolve(value)
    }

    /// Rejects the promise. See [`Promise::reject`].
    pub fn reject(&self, cause: Error) -> Result<()> {
        self.promise.reject(cause)
    }

    /// Settles the promise as cancelled.
    pub fn settle_cancelled(&self) -> Result<()> {
        self.promise.settle_cancelled()
    }

    /// Returns true if a consumer asked for cancellation.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.promise.is_cancel_requested()
    }

    /// Returns the promise this resolver settles.
    #[must_use]
    pub fn promise(&self) -> &Promise<T> {
        &self.promise
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise.id())
            .finish()
    }
}

/// Builder for promises that need a label or a cancel callback up front.
///
/// ```
/// use settle::{Promise, PromiseContext};
///
/// let ctx = PromiseContext::default();
/// let p: Promise<u32> = Promise::builder(&ctx)
///     .name("fetch")
///     .with_resolver(|r| r.resolve(7));
/// assert_eq!(p.value(), Some(7));
/// ```
#[must_use = "a builder does nothing until `pending` or `with_resolver` is called"]
pub struct PromiseBuilder<T> {
    ctx: PromiseContext,
    name: Option<Arc<str>>,
    on_cancel: Option<CancelCallback>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> PromiseBuilder<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(ctx: &PromiseContext) -> Self {
        Self {
            ctx: ctx.clone(),
            name: None,
            on_cancel: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Sets the diagnostic label.
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the cancel callback.
    pub fn on_cancel<F>(mut self, on_cancel: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    /// Creates the promise, pending.
    #[must_use]
    pub fn pending(self) -> Promise<T> {
        Promise::create(&self.ctx, self.name, self.on_cancel)
    }

    /// Creates the promise and runs `init` with its resolver before returning.
    ///
    /// A fault raised by `init` rejects the promise if it is still pending;
    /// once settled, the fault is logged and dropped.
    pub fn with_resolver<F>(self, init: F) -> Promise<T>
    where
        F: FnOnce(Resolver<T>) -> Result<()>,
    {
        let promise = self.pending();
        let resolver = Resolver {
            promise: promise.clone(),
        };
        if let Some(fault) = catch_fault(move || init(resolver)) {
            if !promise.try_reject(fault.clone()) {
                warn!(
                    promise_id = %promise.id(),
                    error = %fault,
                    "initializer failed after settling its promise"
                );
            }
        }
        promise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromiseState;
    use std::thread;

    #[test]
    fn initializer_resolves_synchronously() {
        let ctx = PromiseContext::default();
        let p = Promise::from_resolver(&ctx, |r| r.resolve(String::from("hi")));
        assert_eq!(p.value().as_deref(), Some("hi"));
    }

    #[test]
    fn initializer_error_rejects() {
        let ctx = PromiseContext::default();
        let p: Promise<u8> = Promise::from_resolver(&ctx, |_| Err(Error::user("no input")));
        assert_eq!(p.state(), PromiseState::Rejected);
        assert_eq!(p.error().and_then(|e| e.message().map(str::to_string)), Some("no input".into()));
    }

    #[test]
    fn initializer_panic_rejects() {
        let ctx = PromiseContext::default();
        let p: Promise<u8> = Promise::from_resolver(&ctx, |_| panic!("init blew up"));
        assert!(p.error().is_some_and(|e| e.is_panic()));
    }

    #[test]
    fn initializer_fault_after_settle_is_dropped() {
        let ctx = PromiseContext::default();
        let p: Promise<u8> = Promise::from_resolver(&ctx, |r| {
            r.resolve(1)?;
            Err(Error::user("too late"))
        });
        assert_eq!(p.value(), Some(1));
    }

    #[test]
    fn resolver_settles_from_another_thread() {
        let ctx = PromiseContext::default();
        let mut handle = None;
        let p: Promise<u64> = Promise::from_resolver(&ctx, |r| {
            handle = Some(thread::spawn(move || r.resolve(42)));
            Ok(())
        });
        handle
            .expect("worker spawned")
            .join()
            .expect("worker panicked")
            .expect("resolve");
        assert_eq!(p.value(), Some(42));
    }

    #[test]
    fn builder_applies_name_and_cancel() {
        let ctx = PromiseContext::default();
        let p: Promise<()> = Promise::builder(&ctx)
            .name("download")
            .on_cancel(|| Ok(()))
            .pending();
        assert_eq!(p.name().as_deref(), Some("download"));
        assert!(p.is_cancelable());

        let resolver = Resolver { promise: p.clone() };
        assert!(!resolver.is_cancel_requested());
        p.cancel();
        assert!(resolver.is_cancel_requested());
        resolver.settle_cancelled().expect("settle cancelled");
        assert_eq!(resolver.promise().state(), PromiseState::Cancelled);
    }
}
