//! Race combinator: first settlement wins.
//!
//! ```text
//! race([p1, p2, p3]):
//!   first pi to settle     → result takes its value or cause
//!   every other pj         → cancel() if it is cancelable
//!   later settlements      → observed, no effect
//!   []                     → InvalidArgument, raised synchronously
//! ```
//!
//! A win by rejection cancels the losers too. Losers without a cancel
//! callback are left to finish on their own.
//!
//! The race holds only weak handles to its inputs for the fan-out, so a
//! loser that never settles is not kept alive by its peers' continuations.

use crate::context::PromiseContext;
use crate::error::{Error, Result};
use crate::promise::{Promise, WeakPromise};
use crate::tracing_compat::debug;
use std::sync::Arc;

/// Settles with whichever input settles first and cancels the rest.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument)
/// when `promises` is empty.
pub fn race<T, I>(ctx: &PromiseContext, promises: I) -> Result<Promise<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    if promises.is_empty() {
        return Err(Error::invalid_argument("race requires at least one promise"));
    }

    let result = Promise::new(ctx);
    let peers: Arc<[WeakPromise<T>]> = promises.iter().map(Promise::downgrade).collect();

    for (index, promise) in promises.iter().enumerate() {
        let (on_value, on_cause) = (result.clone(), result.clone());
        let (value_peers, cause_peers) = (Arc::clone(&peers), Arc::clone(&peers));
        promise.action_handlers(
            &result,
            move |value| {
                if on_value.try_resolve(value) {
                    cancel_losers(&on_value, &value_peers, index);
                }
                Ok(())
            },
            move |cause| {
                if on_cause.try_reject(cause) {
                    cancel_losers(&on_cause, &cause_peers, index);
                }
                Ok(())
            },
        );
    }
    Ok(result)
}

/// Requests cancellation of every cancelable input except the winner.
fn cancel_losers<T>(result: &Promise<T>, peers: &[WeakPromise<T>], winner: usize)
where
    T: Clone + Send + 'static,
{
    let mut cancelled = 0_usize;
    for (index, peer) in peers.iter().enumerate() {
        if index == winner {
            continue;
        }
        let Some(loser) = peer.upgrade() else {
            continue;
        };
        if loser.is_cancelable() && loser.cancel() {
            cancelled += 1;
        }
    }
    debug!(
        promise_id = %result.id(),
        winner,
        losers_cancelled = cancelled,
        "race settled"
    );
    let _ = (result, cancelled);
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Chains into [`race`] over the promises produced from the value.
    ///
    /// An empty set of promises rejects the returned promise with
    /// [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument).
    pub fn then_race<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Vec<Promise<U>>> + Send + 'static,
    {
        let ctx = self.context().clone();
        self.and_then(move |value| race(&ctx, f(value)?))
    }
}
