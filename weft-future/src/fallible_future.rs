//! Fallible flavor of the completion primitive.
//!
//! `FallibleFuture<S>` is not a different machine — it is `Future<Fallible<S>>`,
//! the same cell parameterized with the success-or-failure sum. Everything
//! here is sugar over `try_complete`/`on_complete`.

use std::sync::Arc;

use weft::cancellation::Cancellable;
use weft::executor::Executor;
use weft::fallible::{Fallible, Fault};

use crate::future::{Future, Handler, Promise};

/// A future completing with success or failure.
pub type FallibleFuture<S> = Future<Fallible<S>>;

/// The write handle of a [`FallibleFuture`].
pub type FalliblePromise<S> = Promise<Fallible<S>>;

impl<S: Send + Sync + 'static> Promise<Fallible<S>> {
    /// Completes with a success value. `false` if already terminal.
    pub fn succeed(&self, value: S) -> bool {
        self.try_complete(Fallible::Success(value))
    }

    /// Completes with a failure. `false` if already terminal.
    pub fn fail(&self, fault: Fault) -> bool {
        self.try_complete(Fallible::Failure(fault))
    }

    /// Completes with the pre-agreed cancellation failure.
    ///
    /// Cancellation is not a separate code path: this is an ordinary
    /// completion carrying `WeftError::Cancelled`.
    pub fn cancel(&self) -> bool {
        self.try_complete(Fallible::cancelled())
    }
}

impl<S: Send + Sync + 'static> Cancellable for Promise<Fallible<S>> {
    fn cancel(&self) {
        Promise::cancel(self);
    }
}

impl<S: Send + Sync + 'static> Future<Fallible<S>> {
    /// Runs `block` with the success value; failures are not observed.
    pub fn on_success<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.on_complete(executor, move |fallible: &Fallible<S>| {
            if let Some(value) = fallible.success() {
                block(value);
            }
        });
    }

    /// Runs `block` with the failure; successes are not observed.
    pub fn on_failure<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.on_complete(executor, move |fallible: &Fallible<S>| {
            if let Some(fault) = fallible.failure() {
                block(fault);
            }
        });
    }

    /// Maps the success arm; failures propagate untouched.
    pub fn map_success<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> FallibleFuture<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&S) -> U + Send + Sync + 'static,
    {
        self.map(executor, move |fallible: &Fallible<S>| match fallible {
            Fallible::Success(value) => Fallible::Success(f(value)),
            Fallible::Failure(fault) => Fallible::Failure(fault.clone()),
        })
    }

    /// Chains a fallible, future-returning step off the success arm.
    ///
    /// Failures skip `f` and fail the derived future directly; the inner
    /// future's outcome becomes the derived future's outcome.
    pub fn flat_map<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> FallibleFuture<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&S) -> FallibleFuture<U> + Send + Sync + 'static,
    {
        let promise = Promise::new();
        let down = Arc::downgrade(&promise.core);
        let handler = Handler::new(executor, move |value: &Arc<Fallible<S>>| {
            let core = match down.upgrade() {
                Some(core) => core,
                None => return,
            };
            match &**value {
                Fallible::Failure(fault) => {
                    core.try_complete_shared(Arc::new(Fallible::Failure(fault.clone())));
                }
                Fallible::Success(s) => {
                    let inner = f(s);
                    let down_inner = Arc::downgrade(&core);
                    let inner_handler = Handler::new(
                        weft::executor::InlineExecutor::shared(),
                        move |value: &Arc<Fallible<U>>| {
                            if let Some(core) = down_inner.upgrade() {
                                core.try_complete_shared(value.clone());
                            }
                        },
                    );
                    core.retain(inner_handler.clone());
                    inner.core.subscribe(&inner_handler);
                }
            }
        });
        promise.core.retain(handler.clone());
        self.core.subscribe(&handler);
        promise.future()
    }
}

/// A future already completed with `value`.
pub fn completed<T: Send + Sync + 'static>(value: T) -> Future<T> {
    let promise = Promise::new();
    promise.try_complete(value);
    promise.future()
}

/// A fallible future already succeeded with `value`.
pub fn succeeded<S: Send + Sync + 'static>(value: S) -> FallibleFuture<S> {
    completed(Fallible::Success(value))
}

/// A fallible future already failed with `fault`.
pub fn failed<S: Send + Sync + 'static>(fault: Fault) -> FallibleFuture<S> {
    completed(Fallible::Failure(fault))
}

/// A fallible future already cancelled.
pub fn cancelled<S: Send + Sync + 'static>() -> FallibleFuture<S> {
    completed(Fallible::cancelled())
}
