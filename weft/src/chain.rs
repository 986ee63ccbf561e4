//! `HeadCell<N>` — a lock-free head pointer with a retrying swap protocol.
//!
//! This is the single synchronization point for every subscriber list in
//! weft: the future's waiting-handler chain, the stream's live-subscriber
//! chain, and the cancellation token's item list are all immutable
//! singly-linked chains hanging off one `HeadCell`.
//!
//! Mutation goes through [`HeadCell::update`]: the caller supplies a pure
//! function from the currently observed head to a [`HeadChange`], and the
//! cell attempts a compare-and-swap. If a concurrent writer wins the race,
//! the function is **re-evaluated against the freshly observed head** and
//! the swap is retried. The function therefore must not have side effects —
//! it may run any number of times.
//!
//! # Reclamation
//!
//! Nodes are heap allocations managed through epoch-based reclamation
//! (`crossbeam-epoch`). A node built for a losing swap attempt was never
//! published, so it is dropped immediately; a node detached from a live
//! chain must be retired through [`Guard::defer_destroy`] by whoever
//! detached it, while concurrent readers may still hold the old head.
//!
//! # Example
//!
//! ```rust
//! use crossbeam_epoch::{self as epoch, Owned};
//! use weft::chain::{HeadCell, HeadChange};
//!
//! struct Node {
//!     value: u32,
//! }
//!
//! let cell: HeadCell<Node> = HeadCell::null();
//! let guard = epoch::pin();
//!
//! // Publish a node.
//! let swapped = cell.update(&guard, |_head| {
//!     HeadChange::Swap(Owned::new(Node { value: 7 }))
//! });
//! assert!(swapped.old.is_null());
//!
//! // Observe it.
//! let head = cell.load(&guard);
//! assert_eq!(unsafe { head.deref() }.value, 7);
//! ```

use core::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

/// Decision returned by the closure passed to [`HeadCell::update`].
pub enum HeadChange<N> {
    /// Leave the current head untouched.
    Keep,
    /// Clear the head, detaching the whole chain.
    Clear,
    /// Replace the head with a freshly built node.
    Swap(Owned<N>),
}

/// The observed result of an [`HeadCell::update`] call.
///
/// `old` is the head the winning evaluation of the closure saw; `new` is
/// the head after the swap (equal to `old` for [`HeadChange::Keep`]).
/// Both pointers are valid for the lifetime of the guard passed to
/// `update`, so the caller can walk the pre-swap chain — for example to
/// fire handlers that were waiting on it — without racing reclamation.
pub struct Swapped<'g, N> {
    /// Head before the swap.
    pub old: Shared<'g, N>,
    /// Head after the swap.
    pub new: Shared<'g, N>,
}

/// A lock-free nullable head pointer over heap-allocated chain nodes.
///
/// The cell itself never frees nodes: it does not know how a node links to
/// its successor. The owning data structure walks and retires chains (on
/// swap-out through the caller's guard, on `Drop` through an unprotected
/// walk since `&mut self` guarantees exclusive access).
pub struct HeadCell<N> {
    head: Atomic<N>,
}

impl<N> HeadCell<N> {
    /// Creates an empty cell.
    pub fn null() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Loads the current head.
    #[inline]
    pub fn load<'g>(&self, guard: &'g Guard) -> Shared<'g, N> {
        self.head.load(Ordering::Acquire, guard)
    }

    /// Applies `f` to the observed head and swaps in its decision.
    ///
    /// `f` must be a pure function of its argument: on contention it is
    /// re-run against the just-observed head until a swap sticks. A node
    /// built for a losing attempt is dropped before the retry, so payloads
    /// that survive retries must be cheap to rebuild (clone an `Arc` or a
    /// `Weak`, do not move one-of-a-kind values in).
    ///
    /// Returns the pre-swap and post-swap heads of the winning attempt.
    /// This operation cannot fail; contended writers spin with backoff.
    pub fn update<'g, F>(&self, guard: &'g Guard, mut f: F) -> Swapped<'g, N>
    where
        F: FnMut(Shared<'g, N>) -> HeadChange<N>,
    {
        let backoff = Backoff::new();
        loop {
            let old = self.head.load(Ordering::Acquire, guard);
            let new = match f(old) {
                HeadChange::Keep => return Swapped { old, new: old },
                HeadChange::Clear => Shared::null(),
                HeadChange::Swap(node) => node.into_shared(guard),
            };
            match self
                .head
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(_) => return Swapped { old, new },
                Err(err) => {
                    // The node we built was never published; reclaim it
                    // right away instead of going through the epoch.
                    if !err.new.is_null() {
                        // SAFETY: err.new is the unpublished node from this
                        // losing attempt. No other thread can reach it.
                        unsafe {
                            drop(err.new.into_owned());
                        }
                    }
                    backoff.spin();
                }
            }
        }
    }

    /// Unconditionally detaches the whole chain, returning the old head.
    ///
    /// The caller owns the detached chain and is responsible for walking
    /// and retiring it.
    pub fn take<'g>(&self, guard: &'g Guard) -> Shared<'g, N> {
        self.head.swap(Shared::null(), Ordering::AcqRel, guard)
    }
}

impl<N> Default for HeadCell<N> {
    fn default() -> Self {
        Self::null()
    }
}
