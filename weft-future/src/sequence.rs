//! Batch operations over sequences of fallible futures.
//!
//! All three follow the same completion policy as the two-source
//! combinators: every input must succeed for the output to succeed, and
//! the first failure fails the output immediately without waiting for
//! the stragglers (their late completions land on an already-terminal
//! cell and are dropped).
//!
//! Success values are `Clone` here because joining materializes an owned
//! `Vec` out of values that other subscribers may still observe.

use std::sync::{Arc, Mutex};

use weft::executor::{Executor, InlineExecutor};
use weft::fallible::Fallible;

use crate::fallible_future::{succeeded, FallibleFuture};
use crate::future::{Handler, Promise};

struct JoinState<S> {
    slots: Vec<Option<S>>,
    remaining: usize,
}

/// Joins `futures` positionally into one future of all their successes.
///
/// Result order matches input order regardless of completion order. An
/// empty input succeeds immediately with an empty `Vec`.
pub fn joined<S>(futures: Vec<FallibleFuture<S>>) -> FallibleFuture<Vec<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let promise = Promise::new();
    let count = futures.len();
    if count == 0 {
        promise.succeed(Vec::new());
        return promise.future();
    }

    let state = Arc::new(Mutex::new(JoinState {
        slots: vec![None; count],
        remaining: count,
    }));
    let down = Arc::downgrade(&promise.core);

    for (index, future) in futures.iter().enumerate() {
        let state = state.clone();
        let down = down.clone();
        let handler = Handler::new(
            InlineExecutor::shared(),
            move |value: &Arc<Fallible<S>>| {
                let core = match down.upgrade() {
                    Some(core) => core,
                    None => return,
                };
                match &**value {
                    Fallible::Failure(fault) => {
                        // Fail-fast; late successes from other inputs
                        // land on a terminal cell and are dropped.
                        core.try_complete_shared(Arc::new(Fallible::Failure(fault.clone())));
                    }
                    Fallible::Success(s) => {
                        let finished = {
                            let mut state = state.lock().unwrap();
                            if state.slots[index].is_none() {
                                state.slots[index] = Some(s.clone());
                                state.remaining -= 1;
                            }
                            if state.remaining == 0 {
                                Some(
                                    state
                                        .slots
                                        .iter_mut()
                                        .filter_map(|slot| slot.take())
                                        .collect::<Vec<_>>(),
                                )
                            } else {
                                None
                            }
                        };
                        if let Some(values) = finished {
                            core.try_complete_shared(Arc::new(Fallible::Success(values)));
                        }
                    }
                }
            },
        );
        promise.core.retain(handler.clone());
        future.core.subscribe(&handler);
    }

    promise.future()
}

/// Left-folds `items` through an asynchronous, fallible step.
///
/// Steps are strictly sequenced: `f` for item `n + 1` runs only after the
/// future returned for item `n` has succeeded. The first failing step
/// fails the result and the remaining items are never visited.
pub fn async_reduce<T, A, F>(
    items: Vec<T>,
    initial: A,
    executor: Arc<dyn Executor>,
    f: F,
) -> FallibleFuture<A>
where
    T: Send + Sync + 'static,
    A: Send + Sync + 'static,
    F: Fn(&A, &T) -> FallibleFuture<A> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let mut acc = succeeded(initial);
    for item in items {
        let f = f.clone();
        acc = acc.flat_map(executor.clone(), move |value| f(value, &item));
    }
    acc
}

/// Maps every item through a future-returning `f`, then joins the
/// results positionally.
pub fn async_flat_map<T, U, F>(items: Vec<T>, f: F) -> FallibleFuture<Vec<U>>
where
    T: Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(&T) -> FallibleFuture<U>,
{
    let futures = items.iter().map(&f).collect();
    joined(futures)
}
