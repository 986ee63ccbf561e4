//! Two-source combinators.
//!
//! Each combinator subscribes to one or two upstream streams and drives
//! one downstream [`Producer`](crate::Producer), with a single shared
//! mutex over a handful of plain captures (latest values, pending
//! queues, success flags). Contention on that mutex is between at most
//! two upstream callbacks, so a plain lock is the right tool — the
//! lock-free registry stays where contention is real, in the subscriber
//! chains.
//!
//! Ownership follows one rule everywhere: the upstream chain holds the
//! combinator's handler **weakly**; the strong reference lives in the
//! downstream producer's release pool, and the handler reaches the
//! downstream core through a `Weak`. Dropping every handle to the
//! combined channel therefore releases both upstream registrations and
//! tears down any timers on their next fire.
//!
//! Completion policy is uniform across the pairing combinators: the
//! downstream succeeds only once **both** sides have succeeded (the
//! first success is parked until the second arrives), and fails the
//! moment **either** side fails, without waiting for the other.

mod combine_latest;
mod debounce;
mod merge;
mod sample;
mod throttle;
mod zip;

pub use combine_latest::combine_latest;
pub use debounce::debounce;
pub use merge::{merge, merge_either};
pub use sample::sample;
pub use throttle::throttle;
pub use zip::{zip, zip_with_capacity};

use weft::fallible::Fallible;

/// Completion bookkeeping shared by the pairing combinators: park the
/// first side's success, decide on the second — or fail fast.
pub(crate) struct CompletionJoin<SA, SB> {
    left: Option<SA>,
    right: Option<SB>,
}

impl<SA: Clone, SB: Clone> CompletionJoin<SA, SB> {
    pub(crate) fn new() -> Self {
        Self {
            left: None,
            right: None,
        }
    }

    /// Feeds the left side's terminal value; returns the downstream
    /// terminal once decided.
    pub(crate) fn left(&mut self, terminal: &Fallible<SA>) -> Option<Fallible<(SA, SB)>> {
        match terminal {
            Fallible::Failure(fault) => Some(Fallible::Failure(fault.clone())),
            Fallible::Success(value) => {
                self.left = Some(value.clone());
                self.paired()
            }
        }
    }

    /// Feeds the right side's terminal value.
    pub(crate) fn right(&mut self, terminal: &Fallible<SB>) -> Option<Fallible<(SA, SB)>> {
        match terminal {
            Fallible::Failure(fault) => Some(Fallible::Failure(fault.clone())),
            Fallible::Success(value) => {
                self.right = Some(value.clone());
                self.paired()
            }
        }
    }

    fn paired(&self) -> Option<Fallible<(SA, SB)>> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => Some(Fallible::Success((left.clone(), right.clone()))),
            _ => None,
        }
    }
}
