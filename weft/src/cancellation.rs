//! Cooperative cancellation tokens.
//!
//! A [`CancellationToken`] is a one-way trapdoor: once cancelled it stays
//! cancelled, and every item registered on it is notified exactly once no
//! matter how many threads race `cancel()`. Tokens compose into a tree
//! through [`CancellationToken::make_child`]: cancelling a parent cancels
//! every live child.
//!
//! Cancelling a promise or a producer is not a separate code path — it is
//! completing/closing the primitive with a pre-agreed failure value
//! (`WeftError::Cancelled`), so anything that can be completed can be
//! cancelled by registering it here.
//!
//! The item list is the same single-swap-winner machine as the future
//! cell: a [`HeadCell`] whose head is either a chain of items or the
//! terminal `Cancelled` marker. The thread whose compare-and-swap
//! installs the marker detaches the whole chain and is the only one that
//! fires it.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use crate::chain::{HeadCell, HeadChange};

/// Something that can be cancelled exactly once, from any thread.
pub trait Cancellable: Send + Sync + 'static {
    /// Requests cancellation. Must be idempotent.
    fn cancel(&self);
}

#[derive(Clone)]
enum TokenItem {
    /// A closure fired on cancellation.
    Notify(Arc<dyn Fn() + Send + Sync>),
    /// A weakly held cancellable; skipped if already gone.
    Target(Weak<dyn Cancellable>),
}

impl TokenItem {
    fn fire(&self) {
        match self {
            TokenItem::Notify(f) => f(),
            TokenItem::Target(weak) => {
                if let Some(target) = weak.upgrade() {
                    target.cancel();
                }
            }
        }
    }
}

enum TokenState {
    Item {
        item: TokenItem,
        next: Atomic<TokenState>,
    },
    Cancelled,
}

/// A cancellation token: `Active(items)` until the first `cancel()`,
/// then terminally `Cancelled`.
///
/// # Back-cancellation
///
/// Items added *after* the token was cancelled are either cancelled
/// immediately (`is_back_cancel_allowed() == true`, the default) or
/// silently dropped.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use weft::cancellation::CancellationToken;
///
/// let token = CancellationToken::new();
/// let fired = Arc::new(AtomicUsize::new(0));
/// let probe = fired.clone();
/// token.notify(move || {
///     probe.fetch_add(1, Ordering::SeqCst);
/// });
///
/// token.cancel();
/// token.cancel(); // inert: items fire exactly once total
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct CancellationToken {
    state: HeadCell<TokenState>,
    back_cancel: bool,
}

impl CancellationToken {
    /// Creates a token with back-cancellation allowed.
    pub fn new() -> Arc<Self> {
        Self::with_back_cancel(true)
    }

    /// Creates a token with an explicit back-cancellation policy.
    pub fn with_back_cancel(allowed: bool) -> Arc<Self> {
        Arc::new(Self {
            state: HeadCell::null(),
            back_cancel: allowed,
        })
    }

    /// Reports the back-cancellation policy fixed at construction.
    pub fn is_back_cancel_allowed(&self) -> bool {
        self.back_cancel
    }

    /// Returns `true` once `cancel()` has won.
    pub fn is_cancelled(&self) -> bool {
        let guard = epoch::pin();
        matches!(
            unsafe { self.state.load(&guard).as_ref() },
            Some(TokenState::Cancelled)
        )
    }

    /// Registers a cancellable, held weakly.
    ///
    /// If the token is already cancelled the target is cancelled right
    /// away when back-cancellation is allowed, and ignored otherwise.
    pub fn add<C: Cancellable>(&self, target: &Arc<C>) {
        let weak: Weak<C> = Arc::downgrade(target);
        let weak: Weak<dyn Cancellable> = weak;
        self.push(TokenItem::Target(weak));
    }

    /// Registers a closure fired on cancellation.
    pub fn notify<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push(TokenItem::Notify(Arc::new(f)));
    }

    fn push(&self, item: TokenItem) {
        let guard = epoch::pin();
        let swapped = self.state.update(&guard, |head| {
            if let Some(TokenState::Cancelled) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            let next = Atomic::null();
            next.store(head, Ordering::Relaxed);
            HeadChange::Swap(Owned::new(TokenState::Item {
                item: item.clone(),
                next,
            }))
        });

        if let Some(TokenState::Cancelled) = unsafe { swapped.old.as_ref() } {
            if self.back_cancel {
                item.fire();
            }
        }
    }

    /// Cancels the token.
    ///
    /// The single thread whose swap installs the terminal marker detaches
    /// the item list and fires every item present at swap time; every
    /// other (and every later) call is inert.
    pub fn cancel(&self) {
        let guard = epoch::pin();
        let swapped = self.state.update(&guard, |head| {
            if let Some(TokenState::Cancelled) = unsafe { head.as_ref() } {
                return HeadChange::Keep;
            }
            HeadChange::Swap(Owned::new(TokenState::Cancelled))
        });

        if let Some(TokenState::Cancelled) = unsafe { swapped.old.as_ref() } {
            // Lost the race; the winner fires the items.
            return;
        }

        let mut cur = swapped.old;
        while let Some(TokenState::Item { item, next }) = unsafe { cur.as_ref() } {
            item.fire();
            let nxt = next.load(Ordering::Acquire, &guard);
            // SAFETY: the chain is detached; concurrent `push` losers only
            // reload the head and never dereference these nodes.
            unsafe { guard.defer_destroy(cur) };
            cur = nxt;
        }
    }

    /// Creates a child token cancelled when `self` is cancelled.
    ///
    /// The child is held weakly by the parent; dropping every handle to
    /// the child unregisters it.
    pub fn make_child(self: &Arc<Self>) -> Arc<CancellationToken> {
        let child = CancellationToken::with_back_cancel(self.back_cancel);
        self.add(&child);
        child
    }
}

impl Cancellable for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }
}

impl Drop for CancellationToken {
    fn drop(&mut self) {
        // &mut self guarantees exclusive access; free the chain directly.
        let guard = unsafe { epoch::unprotected() };
        let mut cur = self.state.take(guard);
        while !cur.is_null() {
            // SAFETY: exclusive access at drop time; every node was
            // allocated by `push`/`cancel` via Owned::new.
            let owned = unsafe { cur.into_owned() };
            cur = match &*owned {
                TokenState::Item { next, .. } => next.load(Ordering::Relaxed, guard),
                TokenState::Cancelled => Shared::null(),
            };
        }
    }
}
