//! Weft: composable concurrency primitives without threads of their own.
//!
//! This is the core crate of the weft workspace. It carries the pieces
//! everything else is woven from:
//!
//! - **[`chain`]**: a lock-free head-pointer registry — the single
//!   synchronization point behind every subscriber list in the workspace.
//! - **[`executor`]**: the external scheduling contract. Weft never
//!   creates threads and never blocks; delivery is always handed to an
//!   [`Executor`](executor::Executor).
//! - **[`fallible`]**: the success-or-failure sum every fallible
//!   primitive completes with. Errors are values, never unwinding.
//! - **[`either`]**: origin tags for values merged from two sources.
//! - **[`release_pool`]**: the explicit strong-retention side of weft's
//!   weak subscriber lists.
//! - **[`cancellation`]**: cooperative cancellation tokens forming a
//!   tree, firing each registered item exactly once.
//! - **[`context`]**: execution contexts binding callbacks to a host
//!   object's executor and lifetime.
//! - **[`signal`]**: the one blocking escape hatch, used only by
//!   explicit `wait()` helpers.
//!
//! The single-assignment completion primitive lives in `weft-future`;
//! the multi-value streaming primitive and its combinators live in
//! `weft-channel`.

#![warn(missing_docs)]

pub mod cancellation;
pub mod chain;
pub mod context;
pub mod either;
pub mod executor;
pub mod fallible;
pub mod release_pool;
pub mod signal;

pub use cancellation::{Cancellable, CancellationToken};
pub use context::ExecutionContext;
pub use either::Either;
pub use executor::{Executor, InlineExecutor, Task, ThreadExecutor};
pub use fallible::{fault, Fallible, Fault, WeftError};
pub use release_pool::ReleasePool;
pub use signal::Signal;
