//! Single-assignment completion primitive for the weft workspace.
//!
//! A [`Promise`] is the writable handle, a [`Future`] the read-only view,
//! over one lock-free completion cell: any number of threads may race
//! `try_complete`, exactly one wins, and every subscriber — registered
//! before or after the winning call — observes the single value exactly
//! once, delivered through its own executor.
//!
//! The fallible flavor is the same machine parameterized with
//! [`Fallible`](weft::fallible::Fallible):
//!
//! ```rust
//! use weft::executor::InlineExecutor;
//! use weft_future::{succeeded, FallibleFuture};
//!
//! let future: FallibleFuture<u32> = succeeded(5);
//! let bumped = future.map_success(InlineExecutor::shared(), |v| v + 1);
//! assert_eq!(bumped.wait().success(), Some(&6));
//! ```
//!
//! Sequence operations ([`joined`], [`async_reduce`], [`async_flat_map`])
//! batch many fallible futures into one with all-succeed-or-first-failure
//! semantics.

mod fallible_future;
mod future;
mod sequence;

pub use fallible_future::{
    cancelled, completed, failed, succeeded, FallibleFuture, FalliblePromise,
};
pub use future::{Future, Promise};
pub use sequence::{async_flat_map, async_reduce, joined};
