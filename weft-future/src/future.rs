//! The single-assignment completion cell and its read-only view.
//!
//! State machine: `Waiting(chain) --complete(v)--> Done(v)`, one-way,
//! at most once. The whole cell is one [`HeadCell`] whose head is either
//! a chain of waiting handlers or the terminal `Done` node; completing
//! and subscribing are both head swaps, so the at-most-once guarantee
//! falls out of the compare-and-swap protocol:
//!
//! - a subscriber that loses its swap to a concurrent completion
//!   re-observes the head, finds `Done`, and falls back to immediate
//!   scheduling instead of prepending to a chain that will never fire;
//! - of racing completers, exactly one installs `Done` and walks the
//!   pre-swap chain (newest registration first — acceptable because
//!   handlers are independent); the rest observe `false`.
//!
//! Handlers hang off the chain **weakly**; the strong side is either the
//! cell's own release pool (plain `on_complete`), a derived cell's pool
//! (`map`, `flat_map`, ...), or an execution context's pool (`_in`
//! variants). See `weft::release_pool`.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, Weak};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use weft::chain::{HeadCell, HeadChange};
use weft::context::ExecutionContext;
use weft::executor::{Executor, InlineExecutor};
use weft::fallible::Fallible;
use weft::release_pool::ReleasePool;
use weft::signal::Signal;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub(crate) struct Handler<T> {
    executor: Arc<dyn Executor>,
    block: Box<dyn Fn(&Arc<T>) + Send + Sync>,
}

impl<T: Send + Sync + 'static> Handler<T> {
    pub(crate) fn new<F>(executor: Arc<dyn Executor>, block: F) -> Arc<Self>
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        Arc::new(Self {
            executor,
            block: Box::new(block),
        })
    }

    /// Schedules delivery of `value` on the handler's executor.
    fn fire(self: &Arc<Self>, value: Arc<T>) {
        let this = self.clone();
        self.executor
            .execute(Box::new(move || (this.block)(&value)));
    }
}

// ---------------------------------------------------------------------------
// FutureCore
// ---------------------------------------------------------------------------

enum FutureState<T> {
    Waiting {
        handler: Weak<Handler<T>>,
        next: Atomic<FutureState<T>>,
    },
    Done(Arc<T>),
}

pub(crate) struct FutureCore<T> {
    state: HeadCell<FutureState<T>>,
    retained: ReleasePool,
}

impl<T: Send + Sync + 'static> FutureCore<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: HeadCell::null(),
            retained: ReleasePool::new(),
        })
    }

    /// The completed value, if the cell is already terminal.
    pub(crate) fn peek(&self) -> Option<Arc<T>> {
        let guard = epoch::pin();
        match unsafe { self.state.load(&guard).as_ref() } {
            Some(FutureState::Done(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Keeps `handle` alive until completion (or core drop).
    pub(crate) fn retain<H: Send + 'static>(&self, handle: H) {
        self.retained.retain(handle);
    }

    /// Prepends `handler` to the waiting chain, or schedules it
    /// immediately if the cell is already `Done`.
    pub(crate) fn subscribe(&self, handler: &Arc<Handler<T>>) {
        let guard = epoch::pin();
        let weak = Arc::downgrade(handler);
        let swapped = self.state.update(&guard, |head| {
            if let Some(FutureState::Done(_)) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            let next = Atomic::null();
            next.store(head, Ordering::Relaxed);
            HeadChange::Swap(Owned::new(FutureState::Waiting {
                handler: weak.clone(),
                next,
            }))
        });

        // Covers both the already-completed case and the race where a
        // concurrent completion won while we were prepending.
        if let Some(FutureState::Done(value)) = unsafe { swapped.old.as_ref() } {
            handler.fire(value.clone());
        }
    }

    /// Installs the terminal value. Returns `false` if the cell was
    /// already completed; the losing value is dropped.
    pub(crate) fn try_complete_shared(&self, value: Arc<T>) -> bool {
        let guard = epoch::pin();
        let swapped = self.state.update(&guard, |head| {
            if let Some(FutureState::Done(_)) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            HeadChange::Swap(Owned::new(FutureState::Done(value.clone())))
        });

        if let Some(FutureState::Done(_)) = unsafe { swapped.old.as_ref() } {
            return false;
        }

        // We won the terminal swap: fire the detached pre-swap chain.
        // New subscribers already see `Done` and schedule immediately.
        let mut cur = swapped.old;
        while let Some(FutureState::Waiting { handler, next }) = unsafe { cur.as_ref() } {
            if let Some(handler) = handler.upgrade() {
                handler.fire(value.clone());
            }
            let nxt = next.load(Ordering::Acquire, &guard);
            // SAFETY: the chain is detached from the head; concurrent
            // subscribers only reload the head and never walk old nodes.
            unsafe { guard.defer_destroy(cur) };
            cur = nxt;
        }

        self.retained.drain();
        true
    }
}

impl<T> Drop for FutureCore<T> {
    fn drop(&mut self) {
        // &mut self guarantees exclusive access; free whatever chain (or
        // terminal node) is still linked, without pinning.
        let guard = unsafe { epoch::unprotected() };
        let mut cur = self.state.take(guard);
        while !cur.is_null() {
            // SAFETY: exclusive access at drop time; all nodes were
            // allocated through Owned::new.
            let owned = unsafe { cur.into_owned() };
            cur = match &*owned {
                FutureState::Waiting { next, .. } => next.load(Ordering::Relaxed, guard),
                FutureState::Done(_) => Shared::null(),
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Future — the read-only view
// ---------------------------------------------------------------------------

/// A value that will be assigned exactly once.
///
/// `Future` is the subscriber-facing view; the matching write handle is
/// [`Promise`](crate::Promise). Cloning a `Future` clones the view, not
/// the state.
///
/// # Example
///
/// ```rust
/// use weft::executor::InlineExecutor;
/// use weft_future::Promise;
///
/// let promise = Promise::new();
/// let future = promise.future();
///
/// let doubled = future.map(InlineExecutor::shared(), |v: &u32| v * 2);
/// assert!(promise.try_complete(21));
/// assert_eq!(doubled.wait().as_ref(), &42);
/// ```
pub struct Future<T> {
    pub(crate) core: Arc<FutureCore<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    /// Returns `true` once the future has its value.
    pub fn is_completed(&self) -> bool {
        self.core.peek().is_some()
    }

    /// The completed value, if already assigned.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.core.peek()
    }

    /// Registers `block` to run on `executor` with the completed value.
    ///
    /// If the future is already completed the block is scheduled
    /// immediately; otherwise it fires exactly once on completion. The
    /// registration is retained by the future itself and released when
    /// the value is delivered.
    pub fn on_complete<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let handler = Handler::new(executor, move |value: &Arc<T>| block(value));
        self.core.retain(handler.clone());
        self.core.subscribe(&handler);
    }

    /// Context-bound variant of [`on_complete`](Future::on_complete).
    ///
    /// The context is held weakly: if it is gone by the time the value
    /// arrives, the block is silently skipped. The registration lives in
    /// the context's release pool, so it dies with the context.
    pub fn on_complete_in<C, F>(&self, ctx: &Arc<C>, block: F)
    where
        C: ExecutionContext,
        F: Fn(&C, &T) + Send + Sync + 'static,
    {
        let weak_ctx = Arc::downgrade(ctx);
        let handler = Handler::new(ctx.executor(), move |value: &Arc<T>| {
            if let Some(ctx) = weak_ctx.upgrade() {
                block(&ctx, value);
            }
        });
        ctx.release_pool().retain(handler.clone());
        self.core.subscribe(&handler);
    }

    /// Derives a future holding `f` of this future's value.
    ///
    /// The derived future retains the registration: dropping it releases
    /// the subscription on `self`, so an abandoned pipeline costs
    /// nothing.
    pub fn map<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let promise = Promise::new();
        let down = Arc::downgrade(&promise.core);
        let handler = Handler::new(executor, move |value: &Arc<T>| {
            if let Some(core) = down.upgrade() {
                core.try_complete_shared(Arc::new(f(value)));
            }
        });
        promise.core.retain(handler.clone());
        self.core.subscribe(&handler);
        promise.future()
    }

    /// Context-bound [`map`](Future::map) producing a fallible future.
    ///
    /// If the context is gone when the value arrives, the derived future
    /// fails with `WeftError::ContextDeallocated`.
    pub fn map_in<C, U, F>(&self, ctx: &Arc<C>, f: F) -> Future<Fallible<U>>
    where
        C: ExecutionContext,
        U: Send + Sync + 'static,
        F: Fn(&C, &T) -> U + Send + Sync + 'static,
    {
        let promise = Promise::new();
        let down = Arc::downgrade(&promise.core);
        let weak_ctx = Arc::downgrade(ctx);
        let handler = Handler::new(ctx.executor(), move |value: &Arc<T>| {
            let core = match down.upgrade() {
                Some(core) => core,
                None => return,
            };
            match weak_ctx.upgrade() {
                Some(ctx) => {
                    core.try_complete_shared(Arc::new(Fallible::Success(f(&ctx, value))));
                }
                None => {
                    core.try_complete_shared(Arc::new(Fallible::context_deallocated()));
                }
            }
        });
        promise.core.retain(handler.clone());
        self.core.subscribe(&handler);
        promise.future()
    }

    /// Blocks the calling thread until the value arrives.
    ///
    /// The one place the completion primitive blocks; combinators never
    /// call it.
    pub fn wait(&self) -> Arc<T> {
        if let Some(value) = self.core.peek() {
            return value;
        }
        let signal = Arc::new(Signal::new());
        let slot: Arc<Mutex<Option<Arc<T>>>> = Arc::new(Mutex::new(None));
        let handler = Handler::new(InlineExecutor::shared(), {
            let signal = signal.clone();
            let slot = slot.clone();
            move |value: &Arc<T>| {
                *slot.lock().unwrap() = Some(value.clone());
                signal.notify();
            }
        });
        // The stack keeps the handler alive for the duration of the wait.
        self.core.subscribe(&handler);
        signal.wait();
        let value = slot.lock().unwrap().take();
        value.expect("signal notified without a delivered value")
    }
}

impl<T: Send + Sync + 'static> Future<Future<T>> {
    /// Collapses a future of a future into one level.
    ///
    /// Plumbing only: the inner registration is scheduled inline, the
    /// caller's handlers still run on their own executors.
    pub fn flatten(&self) -> Future<T> {
        let promise = Promise::new();
        let down = Arc::downgrade(&promise.core);
        let outer = Handler::new(InlineExecutor::shared(), move |inner: &Arc<Future<T>>| {
            let core = match down.upgrade() {
                Some(core) => core,
                None => return,
            };
            let down_inner = Arc::downgrade(&core);
            let inner_handler = Handler::new(InlineExecutor::shared(), move |value: &Arc<T>| {
                if let Some(core) = down_inner.upgrade() {
                    core.try_complete_shared(value.clone());
                }
            });
            core.retain(inner_handler.clone());
            inner.core.subscribe(&inner_handler);
        });
        promise.core.retain(outer.clone());
        self.core.subscribe(&outer);
        promise.future()
    }
}

// ---------------------------------------------------------------------------
// Promise — the write handle
// ---------------------------------------------------------------------------

/// The writable handle of a [`Future`].
///
/// Exactly one of any number of racing [`try_complete`](Promise::try_complete)
/// calls wins; the others observe `false` and their values are dropped.
pub struct Promise<T> {
    pub(crate) core: Arc<FutureCore<T>>,
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// Creates an incomplete promise.
    pub fn new() -> Self {
        Self {
            core: FutureCore::new(),
        }
    }

    /// The read-only view onto this promise's state.
    pub fn future(&self) -> Future<T> {
        Future {
            core: self.core.clone(),
        }
    }

    /// Completes the future with `value`.
    ///
    /// Returns `false` — a no-op, not an error — if the future was
    /// already completed.
    pub fn try_complete(&self, value: T) -> bool {
        self.core.try_complete_shared(Arc::new(value))
    }
}

impl<T: Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}
