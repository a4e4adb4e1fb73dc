//! Wait-all aggregation.
//!
//! # Semantics
//!
//! ```text
//! all([p1, p2, p3]):
//!   every pi resolves        → resolve([v1, v2, v3])   (input order)
//!   first pi rejects with e  → reject(e)               (later outcomes ignored)
//!   []                       → resolve([])
//! ```
//!
//! Values are stored by input index, so completion order never leaks into
//! the result. No partial results are exposed on failure.

use crate::context::PromiseContext;
use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::tracing_compat::debug;
use parking_lot::Mutex;
use std::sync::Arc;

struct Collected<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Resolves with every input value in input order, or rejects with the
/// first rejection.
pub fn all<T, I>(ctx: &PromiseContext, promises: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<Promise<T>> = promises.into_iter().collect();
    let result = Promise::new(ctx);
    if promises.is_empty() {
        result.try_resolve(Vec::new());
        return result;
    }

    let collected = Arc::new(Mutex::new(Collected {
        values: vec![None; promises.len()],
        remaining: promises.len(),
    }));

    for (index, promise) in promises.iter().enumerate() {
        let (on_value, on_cause) = (result.clone(), result.clone());
        let collected = Arc::clone(&collected);
        promise.action_handlers(
            &result,
            move |value| {
                let finished = {
                    let mut collected = collected.lock();
                    collected.values[index] = Some(value);
                    collected.remaining -= 1;
                    (collected.remaining == 0).then(|| std::mem::take(&mut collected.values))
                };
                let Some(values) = finished else {
                    return Ok(());
                };
                let values: Vec<T> = values
                    .into_iter()
                    .collect::<Option<_>>()
                    .ok_or_else(|| Error::invalid_state("all: an input resolved without a value"))?;
                debug!(promise_id = %on_value.id(), count = values.len(), "all inputs resolved");
                on_value.try_resolve(values);
                Ok(())
            },
            move |cause| {
                on_cause.try_reject(cause);
                Ok(())
            },
        );
    }
    result
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Chains into [`all`] over the promises produced from the value.
    pub fn then_all<U, F>(&self, f: F) -> Promise<Vec<U>>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Vec<Promise<U>>> + Send + 'static,
    {
        let ctx = self.context().clone();
        self.and_then(move |value| Ok(all(&ctx, f(value)?)))
    }
}
