//! Continuation storage and fault-redirecting invocation.
//!
//! Every continuation is stored together with the target that receives its
//! fault. Invoking a continuation never unwinds into the dispatch loop: an
//! `Err` or a panic is captured and handed to that target, which is the
//! downstream promise of the chain step (or the unhandled-rejection sink for
//! `done`), never the promise whose handlers are being dispatched.
//!
//! Fatal unhandled rejections are the one thing that must escape. They are
//! recorded per thread while any dispatch frame is active and raised once the
//! outermost frame has finished its whole handler pass.

use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static FRAME_DEPTH: Cell<usize> = const { Cell::new(0) };
    static DEFERRED_FATAL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Marks an active dispatch frame on this thread for the duration of the
/// guard.
struct FrameGuard;

impl FrameGuard {
    fn enter() -> Self {
        FRAME_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let remaining = FRAME_DEPTH.with(|depth| {
            let remaining = depth.get().saturating_sub(1);
            depth.set(remaining);
            remaining
        });
        if remaining == 0 && std::thread::panicking() {
            DEFERRED_FATAL.with(|slot| slot.borrow_mut().take());
        }
    }
}

/// Runs `f` as a dispatch frame. A fatal raised inside it surfaces when the
/// outermost frame on this thread returns.
fn in_frame<R>(f: impl FnOnce() -> R) -> R {
    let frame = FrameGuard::enter();
    let out = f();
    drop(frame);
    if FRAME_DEPTH.with(Cell::get) == 0 {
        if let Some(message) = DEFERRED_FATAL.with(|slot| slot.borrow_mut().take()) {
            panic!("{message}");
        }
    }
    out
}

/// Raises a fatal fault past every continuation guard.
///
/// Outside any dispatch frame this panics immediately. Inside one, the first
/// fatal is held until the outermost frame completes, so the remaining
/// handlers of the pass still fire. Later fatals in the same pass are
/// dropped; callers log them before raising.
pub(crate) fn raise_fatal(message: String) {
    let deferred = FRAME_DEPTH.with(|depth| depth.get() > 0);
    if !deferred {
        panic!("{message}");
    }
    DEFERRED_FATAL.with(|slot| {
        slot.borrow_mut().get_or_insert(message);
    });
}

/// Receives faults raised by continuations.
pub(crate) trait FaultTarget: Send {
    /// Takes ownership of a fault that could not be handled where it arose.
    fn receive_fault(&self, fault: Error);
}

type Callback<A> = Box<dyn FnOnce(A) -> Result<()> + Send>;

/// A registered continuation paired with its fault target.
pub(crate) struct Handler<A> {
    callback: Callback<A>,
    target: Box<dyn FaultTarget>,
}

impl<A> Handler<A> {
    pub(crate) fn new<F>(callback: F, target: Box<dyn FaultTarget>) -> Self
    where
        F: FnOnce(A) -> Result<()> + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
            target,
        }
    }

    /// Runs the continuation once, redirecting any fault.
    pub(crate) fn invoke(self, arg: A) {
        let Self { callback, target } = self;
        if let Some(fault) = catch_fault(move || callback(arg)) {
            target.receive_fault(fault);
        }
    }
}

/// Fires `handlers` in registration order, each with its own copy of `arg`.
pub(crate) fn dispatch<A: Clone>(handlers: Vec<Handler<A>>, arg: &A) {
    in_frame(|| {
        for handler in handlers {
            handler.invoke(arg.clone());
        }
    });
}

/// Runs `f`, turning an `Err` or a panic into the returned fault.
pub(crate) fn catch_fault<F>(f: F) -> Option<Error>
where
    F: FnOnce() -> Result<()>,
{
    match in_frame(|| panic::catch_unwind(AssertUnwindSafe(f))) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(payload) => Some(Error::from_panic(payload.as_ref())),
    }
}
