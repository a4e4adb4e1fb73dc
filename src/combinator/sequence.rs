//! Run promise-returning steps one after another.

use crate::context::PromiseContext;
use crate::error::Result;
use crate::promise::Promise;

/// A deferred step for [`sequence`].
pub type Step = Box<dyn FnOnce() -> Result<Promise<()>> + Send>;

/// Starts each step once the previous one resolved.
///
/// The returned promise resolves after the last step resolves and rejects
/// with the first rejection or fault; remaining steps are then never
/// started. Empty input resolves immediately.
pub fn sequence<I>(ctx: &PromiseContext, steps: I) -> Promise<()>
where
    I: IntoIterator<Item = Step>,
{
    steps
        .into_iter()
        .fold(Promise::resolved(ctx, ()), |previous, step| {
            previous.and_then(move |()| step())
        })
}
