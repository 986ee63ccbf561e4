//! Explicit strong-retention bag for subscription handles.
//!
//! Subscriber chains hold their handlers **weakly** so a dropped
//! downstream never keeps an upstream graph alive. The strong side of
//! that bargain is a `ReleasePool`: whoever needs a handler to stay alive
//! — the future/stream that owns terminal subscriptions, or a derived
//! primitive that owns its upstream registrations — parks the `Arc` here.
//! Draining the pool (on completion, close, or drop) releases every
//! registration at once.

use std::any::Any;
use std::sync::Mutex;

/// An owned bag of opaque handles.
pub struct ReleasePool {
    handles: Mutex<Vec<Box<dyn Any + Send>>>,
}

impl ReleasePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Keeps `handle` alive until the pool is drained or dropped.
    pub fn retain<T: Send + 'static>(&self, handle: T) {
        self.handles.lock().unwrap().push(Box::new(handle));
    }

    /// Releases every retained handle.
    ///
    /// The handles are dropped outside the pool's lock, so their
    /// destructors may retain into this pool again without deadlocking.
    pub fn drain(&self) {
        let drained = {
            let mut handles = self.handles.lock().unwrap();
            std::mem::take(&mut *handles)
        };
        drop(drained);
    }

    /// Number of currently retained handles.
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    /// Returns `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReleasePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn drain_drops_everything_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let pool = ReleasePool::new();
        for _ in 0..4 {
            pool.retain(DropProbe(drops.clone()));
        }
        assert_eq!(pool.len(), 4);
        pool.drain();
        assert_eq!(drops.load(Ordering::SeqCst), 4);
        assert!(pool.is_empty());
        pool.drain();
        assert_eq!(drops.load(Ordering::SeqCst), 4);
    }
}
