//! The buffered multi-value streaming state machine and its two faces.
//!
//! State machine per stream:
//!
//! ```text
//! Open(subscribers, ring) --update(u)--> Open(subscribers, ring')
//! Open --close(final)--> Closed(final)      (terminal; single winner)
//! ```
//!
//! The live-subscriber chain is the same lock-free registry the future
//! cell uses; the terminal `Closed` node is installed by a single
//! compare-and-swap winner exactly like a future's `Done`. The bounded
//! replay ring sits under a small mutex that is held across
//! push + fan-out on the writer side and across replay + join on the
//! subscriber side — that pairing is what makes "a joining subscriber
//! replays the buffer, then sees every later live update, each exactly
//! once" true without a subscription-wide lock-free protocol.
//!
//! [`Producer`] is the writer-facing handle, [`Channel`] the read-only
//! subscriber-facing view; they share one [`StreamCore`] — a capability
//! split, not two data structures.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, Weak};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use weft::cancellation::Cancellable;
use weft::chain::{HeadCell, HeadChange};
use weft::context::ExecutionContext;
use weft::executor::{Executor, InlineExecutor};
use weft::fallible::{Fallible, Fault};
use weft::release_pool::ReleasePool;
use weft::signal::Signal;

use crate::event::StreamEvent;

/// Replay capacity used by [`Producer::new`].
pub const DEFAULT_BUFFER_SIZE: usize = 1;

// ---------------------------------------------------------------------------
// StreamHandler
// ---------------------------------------------------------------------------

pub(crate) struct StreamHandler<U, S> {
    executor: Arc<dyn Executor>,
    block: Box<dyn Fn(StreamEvent<U, S>) + Send + Sync>,
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> StreamHandler<U, S> {
    pub(crate) fn new<F>(executor: Arc<dyn Executor>, block: F) -> Arc<Self>
    where
        F: Fn(StreamEvent<U, S>) + Send + Sync + 'static,
    {
        Arc::new(Self {
            executor,
            block: Box::new(block),
        })
    }

    fn fire(self: &Arc<Self>, event: StreamEvent<U, S>) {
        let this = self.clone();
        self.executor
            .execute(Box::new(move || (this.block)(event)));
    }

    /// Like [`fire`](Self::fire), but with the executor the event is
    /// being produced on known: handlers whose executor reports the
    /// calling context as synchronously satisfiable are invoked
    /// directly, skipping a queue round-trip.
    fn fire_from(self: &Arc<Self>, event: StreamEvent<U, S>, from: Option<&dyn Executor>) {
        if let Some(from) = from {
            if self.executor.can_run_synchronously_from(from) {
                (self.block)(event);
                return;
            }
        }
        self.fire(event);
    }
}

// ---------------------------------------------------------------------------
// StreamCore
// ---------------------------------------------------------------------------

enum StreamState<U, S> {
    Subscriber {
        handler: Weak<StreamHandler<U, S>>,
        next: Atomic<StreamState<U, S>>,
    },
    Closed(Arc<Fallible<S>>),
}

struct Ring<U> {
    items: VecDeque<Arc<U>>,
    capacity: usize,
}

impl<U> Ring<U> {
    fn push(&mut self, value: Arc<U>) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }
}

pub(crate) struct StreamCore<U, S> {
    chain: HeadCell<StreamState<U, S>>,
    ring: Mutex<Ring<U>>,
    retained: ReleasePool,
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> StreamCore<U, S> {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            chain: HeadCell::null(),
            ring: Mutex::new(Ring {
                items: VecDeque::with_capacity(capacity),
                capacity,
            }),
            retained: ReleasePool::new(),
        })
    }

    pub(crate) fn retain<H: Send + 'static>(&self, handle: H) {
        self.retained.retain(handle);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.terminal().is_some()
    }

    pub(crate) fn terminal(&self) -> Option<Arc<Fallible<S>>> {
        let guard = epoch::pin();
        match unsafe { self.chain.load(&guard).as_ref() } {
            Some(StreamState::Closed(terminal)) => Some(terminal.clone()),
            _ => None,
        }
    }

    /// Streams one value: into the ring, then to every live subscriber
    /// in writer-call order. `false` if the stream is closed.
    pub(crate) fn apply(&self, value: Arc<U>) -> bool {
        self.apply_from(value, None)
    }

    /// [`apply`](Self::apply) with the producing executor known, so
    /// compatible handlers can take the synchronous fast path.
    pub(crate) fn apply_from(&self, value: Arc<U>, from: Option<&dyn Executor>) -> bool {
        let mut ring = self.ring.lock().unwrap();
        let guard = epoch::pin();
        let head = self.chain.load(&guard);
        if let Some(StreamState::Closed(_)) = unsafe { head.as_ref() } {
            return false;
        }
        ring.push(value.clone());

        // Fan out while still holding the ring lock: this keeps each
        // subscriber's delivery order equal to writer-call order and
        // closes the window where a joining subscriber could replay this
        // value and also receive it live. Delivery itself is scheduled
        // through each handler's executor; a handler on an inline
        // executor must not reenter this producer.
        let mut cur = head;
        while let Some(StreamState::Subscriber { handler, next }) = unsafe { cur.as_ref() } {
            if let Some(handler) = handler.upgrade() {
                handler.fire_from(StreamEvent::Update(value.clone()), from);
            }
            cur = next.load(Ordering::Acquire, &guard);
        }
        true
    }

    /// Installs the terminal value. Single winner; `false` otherwise.
    pub(crate) fn close_shared(&self, terminal: Arc<Fallible<S>>) -> bool {
        let _ring = self.ring.lock().unwrap();
        let guard = epoch::pin();
        let swapped = self.chain.update(&guard, |head| {
            if let Some(StreamState::Closed(_)) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            HeadChange::Swap(Owned::new(StreamState::Closed(terminal.clone())))
        });

        if let Some(StreamState::Closed(_)) = unsafe { swapped.old.as_ref() } {
            return false;
        }

        let mut cur = swapped.old;
        while let Some(StreamState::Subscriber { handler, next }) = unsafe { cur.as_ref() } {
            if let Some(handler) = handler.upgrade() {
                handler.fire(StreamEvent::Completion(terminal.clone()));
            }
            let nxt = next.load(Ordering::Acquire, &guard);
            // SAFETY: the chain is detached behind the Closed head; new
            // subscribers observe Closed and never walk these nodes.
            unsafe { guard.defer_destroy(cur) };
            cur = nxt;
        }

        self.retained.drain();
        true
    }

    /// Joins `handler` to the stream.
    ///
    /// Open: replays the ring oldest-first, then links into the live
    /// chain, all under the ring lock so no live update can interleave.
    /// Closed: delivers only the terminal value — a closed stream is
    /// terminal, not a replayable history log.
    pub(crate) fn subscribe(&self, handler: &Arc<StreamHandler<U, S>>) {
        let ring = self.ring.lock().unwrap();
        let guard = epoch::pin();
        let weak = Arc::downgrade(handler);
        let swapped = self.chain.update(&guard, |head| {
            if let Some(StreamState::Closed(_)) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            let next = Atomic::null();
            next.store(head, Ordering::Relaxed);
            HeadChange::Swap(Owned::new(StreamState::Subscriber {
                handler: weak.clone(),
                next,
            }))
        });

        if let Some(StreamState::Closed(terminal)) = unsafe { swapped.old.as_ref() } {
            handler.fire(StreamEvent::Completion(terminal.clone()));
            return;
        }

        for value in ring.items.iter() {
            handler.fire(StreamEvent::Update(value.clone()));
        }
    }
}

impl<U, S> Drop for StreamCore<U, S> {
    fn drop(&mut self) {
        // &mut self guarantees exclusive access; free the chain directly.
        let guard = unsafe { epoch::unprotected() };
        let mut cur = self.chain.take(guard);
        while !cur.is_null() {
            // SAFETY: exclusive access at drop time; all nodes were
            // allocated through Owned::new.
            let owned = unsafe { cur.into_owned() };
            cur = match &*owned {
                StreamState::Subscriber { next, .. } => next.load(Ordering::Relaxed, guard),
                StreamState::Closed(_) => Shared::null(),
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Producer — the writer handle
// ---------------------------------------------------------------------------

/// The writer-facing handle of a stream.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use weft::executor::InlineExecutor;
/// use weft_channel::Producer;
///
/// let producer: Producer<u32, ()> = Producer::with_buffer(2);
/// producer.update(1);
/// producer.update(2);
/// producer.update(3);
///
/// // A late subscriber replays the last two updates, then lives on.
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = seen.clone();
/// producer.channel().on_update(InlineExecutor::shared(), move |v: &u32| {
///     log.lock().unwrap().push(*v);
/// });
/// producer.update(4);
/// assert_eq!(*seen.lock().unwrap(), vec![2, 3, 4]);
/// ```
pub struct Producer<U, S> {
    core: Arc<StreamCore<U, S>>,
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> Producer<U, S> {
    /// A producer with the default replay capacity
    /// ([`DEFAULT_BUFFER_SIZE`]).
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER_SIZE)
    }

    /// A producer replaying the last `capacity` updates to joining
    /// subscribers. `0` delivers live values only.
    ///
    /// The capacity is fixed for the stream's lifetime.
    pub fn with_buffer(capacity: usize) -> Self {
        Self {
            core: StreamCore::new(capacity),
        }
    }

    pub(crate) fn core(&self) -> &Arc<StreamCore<U, S>> {
        &self.core
    }

    /// The read-only view onto this stream.
    pub fn channel(&self) -> Channel<U, S> {
        Channel {
            core: self.core.clone(),
        }
    }

    /// Streams one value to the ring and every live subscriber.
    ///
    /// Returns `false` — a no-op, not an error — once the stream is
    /// closed.
    pub fn update(&self, value: U) -> bool {
        self.core.apply(Arc::new(value))
    }

    /// Closes the stream with `terminal`. Single winner; repeated calls
    /// are deliberately inert and return `false`.
    pub fn close(&self, terminal: Fallible<S>) -> bool {
        self.core.close_shared(Arc::new(terminal))
    }

    /// Closes with a success value.
    pub fn succeed(&self, value: S) -> bool {
        self.close(Fallible::Success(value))
    }

    /// Closes with a failure.
    pub fn fail(&self, fault: Fault) -> bool {
        self.close(Fallible::Failure(fault))
    }

    /// Closes with the pre-agreed cancellation failure.
    pub fn cancel(&self) -> bool {
        self.close(Fallible::cancelled())
    }

    /// Returns `true` once the stream is closed.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> Default for Producer<U, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> Cancellable for Producer<U, S> {
    fn cancel(&self) {
        Producer::cancel(self);
    }
}

// ---------------------------------------------------------------------------
// Channel — the read-only view
// ---------------------------------------------------------------------------

/// The subscriber-facing view of a stream.
///
/// Cloning clones the view; all clones observe the same stream.
pub struct Channel<U, S> {
    core: Arc<StreamCore<U, S>>,
}

impl<U, S> Clone for Channel<U, S> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<U: Send + Sync + 'static, S: Send + Sync + 'static> Channel<U, S> {
    pub(crate) fn core(&self) -> &Arc<StreamCore<U, S>> {
        &self.core
    }

    pub(crate) fn subscribe_handler(&self, handler: &Arc<StreamHandler<U, S>>) {
        self.core.subscribe(handler);
    }

    /// Returns `true` once the stream is closed.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// The terminal value, if the stream is already closed.
    pub fn terminal(&self) -> Option<Arc<Fallible<S>>> {
        self.core.terminal()
    }

    /// Subscribes `block` to every event: buffered replay first (when
    /// open), then live updates, then the completion.
    ///
    /// The registration is retained by the stream itself and released
    /// when the stream closes.
    pub fn on_event<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(StreamEvent<U, S>) + Send + Sync + 'static,
    {
        let handler = StreamHandler::new(executor, block);
        self.core.retain(handler.clone());
        self.core.subscribe(&handler);
    }

    /// Subscribes to updates only.
    pub fn on_update<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(&U) + Send + Sync + 'static,
    {
        self.on_event(executor, move |event| {
            if let Some(value) = event.as_update() {
                block(value);
            }
        });
    }

    /// Subscribes to the terminal value only.
    pub fn on_completion<F>(&self, executor: Arc<dyn Executor>, block: F)
    where
        F: Fn(&Fallible<S>) + Send + Sync + 'static,
    {
        self.on_event(executor, move |event| {
            if let Some(terminal) = event.as_completion() {
                block(terminal);
            }
        });
    }

    /// Context-bound [`on_event`](Channel::on_event): the context is held
    /// weakly and events arriving after it is gone are skipped. The
    /// registration lives in the context's release pool.
    pub fn on_event_in<C, F>(&self, ctx: &Arc<C>, block: F)
    where
        C: ExecutionContext,
        F: Fn(&C, StreamEvent<U, S>) + Send + Sync + 'static,
    {
        let weak_ctx = Arc::downgrade(ctx);
        let handler = StreamHandler::new(ctx.executor(), move |event| {
            if let Some(ctx) = weak_ctx.upgrade() {
                block(&ctx, event);
            }
        });
        ctx.release_pool().retain(handler.clone());
        self.core.subscribe(&handler);
    }

    /// Blocks the calling thread until the stream closes.
    ///
    /// The streaming counterpart of `Future::wait`; combinators never
    /// call it.
    pub fn wait_completion(&self) -> Arc<Fallible<S>> {
        if let Some(terminal) = self.core.terminal() {
            return terminal;
        }
        let signal = Arc::new(Signal::new());
        let slot: Arc<Mutex<Option<Arc<Fallible<S>>>>> = Arc::new(Mutex::new(None));
        let handler = StreamHandler::new(InlineExecutor::shared(), {
            let signal = signal.clone();
            let slot = slot.clone();
            move |event: StreamEvent<U, S>| {
                if let StreamEvent::Completion(terminal) = event {
                    *slot.lock().unwrap() = Some(terminal);
                    signal.notify();
                }
            }
        });
        // The stack keeps the handler alive for the duration of the wait.
        self.core.subscribe(&handler);
        signal.wait();
        let terminal = slot.lock().unwrap().take();
        terminal.expect("signal notified without a terminal value")
    }

    /// A future completing with this stream's terminal value.
    pub fn completion_future(&self) -> weft_future::FallibleFuture<S>
    where
        S: Clone,
    {
        let promise = weft_future::Promise::new();
        let future = promise.future();
        let promise = Arc::new(promise);
        self.on_completion(InlineExecutor::shared(), move |terminal: &Fallible<S>| {
            promise.try_complete(terminal.clone());
        });
        future
    }
}
