//! One-shot thread notification used by the blocking `wait()` helpers.
//!
//! The primitives themselves never block; `Signal` exists only as the
//! escape hatch behind `Future::wait` / `Channel::wait_completion` for
//! synchronous test and CLI code.

use std::sync::{Condvar, Mutex};

/// A one-shot notification any thread can wait on.
pub struct Signal {
    notified: Mutex<bool>,
    cond: Condvar,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Creates an un-notified signal.
    pub fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Blocks until the signal is notified.
    pub fn wait(&self) {
        let mut notified = self.notified.lock().unwrap();
        while !*notified {
            notified = self.cond.wait(notified).unwrap();
        }
    }

    /// Notifies the signal, waking every waiting thread.
    pub fn notify(&self) {
        let mut notified = self.notified.lock().unwrap();
        *notified = true;
        drop(notified);
        self.cond.notify_all();
    }

    /// Returns `true` if the signal has been notified.
    pub fn is_notified(&self) -> bool {
        *self.notified.lock().unwrap()
    }
}
