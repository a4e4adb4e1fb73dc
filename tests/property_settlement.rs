//! Property-based tests for settlement and aggregation.
//!
//! # Settlement
//! - At most one of resolve / reject / settle_cancelled succeeds
//! - Every continuation fires exactly once, in registration order, whether
//!   it was registered before or after settlement
//!
//! # all
//! - Values come back in input order for any completion order
//! - The first rejection in completion order wins
//!
//! # race
//! - The first input to settle wins for any completion order
//! - Each cancelable loser receives exactly one cancel

#[macro_use]
mod common;

use common::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use settle::{all, race, Error, Promise, PromiseContext, PromiseState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Settle {
    Resolve(u32),
    Reject,
    Cancel,
}

impl Settle {
    fn apply(self, promise: &Promise<u32>) -> settle::Result<()> {
        match self {
            Self::Resolve(v) => promise.resolve(v),
            Self::Reject => promise.reject(Error::user("rejected")),
            Self::Cancel => promise.settle_cancelled(),
        }
    }

    fn state(self) -> PromiseState {
        match self {
            Self::Resolve(_) => PromiseState::Resolved,
            Self::Reject => PromiseState::Rejected,
            Self::Cancel => PromiseState::Cancelled,
        }
    }
}

fn arb_settle() -> impl Strategy<Value = Settle> {
    prop_oneof![
        any::<u32>().prop_map(Settle::Resolve),
        Just(Settle::Reject),
        Just(Settle::Cancel),
    ]
}

/// A completion order over `0..n`.
fn arb_order(max: usize) -> impl Strategy<Value = Vec<usize>> {
    (1..=max).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(test_proptest_config(256))]

    /// Only the first settlement succeeds; later ones are invalid-state errors.
    #[test]
    fn settlement_is_at_most_once(ops in prop::collection::vec(arb_settle(), 1..8)) {
        init_test_logging();
        let ctx = PromiseContext::default();
        let promise: Promise<u32> = Promise::new(&ctx);

        prop_assert!(ops[0].apply(&promise).is_ok());
        for op in &ops[1..] {
            let err = op.apply(&promise).expect_err("second settlement must fail");
            prop_assert!(err.is_invalid_state());
        }
        prop_assert_eq!(promise.state(), ops[0].state());
        if let Settle::Resolve(v) = ops[0] {
            prop_assert_eq!(promise.value(), Some(v));
        }
    }

    /// Handlers fire once each, early ones in order before late ones.
    #[test]
    fn handlers_fire_once_in_registration_order(
        before in 0usize..12,
        after in 0usize..12,
        value in any::<u32>(),
    ) {
        let ctx = PromiseContext::default();
        let promise: Promise<u32> = Promise::new(&ctx);
        let fired = Arc::new(Mutex::new(Vec::new()));

        let register = |i: usize| {
            let fired = Arc::clone(&fired);
            promise.then(move |v| {
                fired.lock().push((i, *v));
                Ok(())
            })
        };

        let early: Vec<_> = (0..before).map(register).collect();
        promise.resolve(value).expect("resolve");
        let late: Vec<_> = (before..before + after).map(register).collect();

        let expected: Vec<_> = (0..before + after).map(|i| (i, value)).collect();
        prop_assert_eq!(&*fired.lock(), &expected);
        for downstream in early.iter().chain(&late) {
            prop_assert_eq!(downstream.value(), Some(value));
        }
    }

    /// `all` reports values by input index whatever the completion order.
    #[test]
    fn all_preserves_input_order(order in arb_order(10)) {
        let ctx = PromiseContext::default();
        let inputs: Vec<Promise<usize>> = pending_promises(&ctx, order.len());
        let result = all(&ctx, inputs.clone());

        for (step, &index) in order.iter().enumerate() {
            prop_assert!(result.is_pending(), "resolved early at step {}", step);
            inputs[index].resolve(index * 100).expect("resolve");
        }
        let expected: Vec<usize> = (0..order.len()).map(|i| i * 100).collect();
        prop_assert_eq!(result.value(), Some(expected));
    }

    /// `all` rejects with the first rejection in completion order.
    #[test]
    fn all_fails_fast(order in arb_order(8), reject_mask in any::<u8>()) {
        prop_assume!(order.iter().any(|&i| reject_mask & (1 << i) != 0));
        let ctx = PromiseContext::default();
        let inputs: Vec<Promise<usize>> = pending_promises(&ctx, order.len());
        let result = all(&ctx, inputs.clone());

        let mut first_rejected = None;
        for &index in &order {
            if reject_mask & (1 << index) != 0 {
                first_rejected.get_or_insert(index);
                inputs[index].reject(Error::user(format!("input {index}"))).expect("reject");
            } else {
                inputs[index].resolve(index).expect("resolve");
            }
        }

        let first = first_rejected.expect("assumed at least one rejection");
        let expected = format!("input {first}");
        prop_assert_eq!(result.state(), PromiseState::Rejected);
        prop_assert_eq!(
            result.error().and_then(|e| e.message().map(str::to_string)),
            Some(expected)
        );
    }

    /// The first input to settle wins; every loser is cancelled exactly once.
    #[test]
    fn race_first_settlement_wins(order in arb_order(8), winner_rejects in any::<bool>()) {
        let ctx = PromiseContext::default();
        let cancels: Vec<Arc<AtomicUsize>> =
            (0..order.len()).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let inputs: Vec<Promise<usize>> = cancels
            .iter()
            .map(|count| {
                let count = Arc::clone(count);
                Promise::builder(&ctx)
                    .on_cancel(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .pending()
            })
            .collect();
        let result = race(&ctx, inputs.clone()).expect("race");

        let winner = order[0];
        if winner_rejects {
            inputs[winner].reject(Error::user("winner")).expect("reject");
        } else {
            inputs[winner].resolve(winner).expect("resolve");
        }
        for &index in &order[1..] {
            inputs[index].resolve(index).expect("losers may still settle");
        }

        if winner_rejects {
            prop_assert_eq!(result.state(), PromiseState::Rejected);
        } else {
            prop_assert_eq!(result.value(), Some(winner));
        }
        for (index, count) in cancels.iter().enumerate() {
            let expected = usize::from(index != winner);
            prop_assert_eq!(count.load(Ordering::SeqCst), expected, "input {}", index);
        }
    }
}
