//! Integration tests for the cancellation tree.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use weft::cancellation::{Cancellable, CancellationToken};

struct CountingTarget {
    cancels: AtomicUsize,
}

impl CountingTarget {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancels: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Cancellable for CountingTarget {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Exactly-once semantics
// ============================================================================

#[test]
fn double_cancel_fires_items_once() {
    let token = CancellationToken::new();
    let target = CountingTarget::new();
    token.add(&target);

    token.cancel();
    token.cancel();
    assert_eq!(target.count(), 1);
    assert!(token.is_cancelled());
}

#[test]
fn racing_cancels_have_a_single_winner() {
    const THREADS: usize = 8;

    for _ in 0..50 {
        let token = CancellationToken::new();
        let target = CountingTarget::new();
        token.add(&target);

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            let token = token.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                token.cancel();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(target.count(), 1);
    }
}

#[test]
fn notify_closures_fire_on_cancel() {
    let token = CancellationToken::new();
    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let fired = fired.clone();
        token.notify(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    token.cancel();
    assert_eq!(fired.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Back-cancellation policy
// ============================================================================

#[test]
fn back_cancel_allowed_cancels_late_items_immediately() {
    let token = CancellationToken::with_back_cancel(true);
    token.cancel();

    let target = CountingTarget::new();
    token.add(&target);
    assert_eq!(target.count(), 1);

    let fired = Arc::new(AtomicUsize::new(0));
    let probe = fired.clone();
    token.notify(move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn back_cancel_forbidden_drops_late_items_silently() {
    let token = CancellationToken::with_back_cancel(false);
    token.cancel();

    let target = CountingTarget::new();
    token.add(&target);
    assert_eq!(target.count(), 0);
}

// ============================================================================
// Weak registration and the token tree
// ============================================================================

#[test]
fn dropped_targets_are_skipped() {
    let token = CancellationToken::new();
    let target = CountingTarget::new();
    token.add(&target);
    drop(target);

    // Nothing to observe beyond "does not crash / does not fire".
    token.cancel();
}

#[test]
fn child_token_cancelled_by_parent() {
    let parent = CancellationToken::new();
    let child = parent.make_child();

    let target = CountingTarget::new();
    child.add(&target);

    parent.cancel();
    assert!(child.is_cancelled());
    assert_eq!(target.count(), 1);
}

#[test]
fn child_cancel_does_not_touch_parent() {
    let parent = CancellationToken::new();
    let child = parent.make_child();

    child.cancel();
    assert!(child.is_cancelled());
    assert!(!parent.is_cancelled());
}
