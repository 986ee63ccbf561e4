//! Execution contexts: an executor paired with a retention pool.
//!
//! Context-bound subscription variants (`on_complete_in`, `map_in`, ...)
//! hold their context **weakly** and deliver `(&C, &value)` only while the
//! context is alive; derived primitives observe a lost context as a
//! `WeftError::ContextDeallocated` failure. The context's release pool is
//! the strong-retaining side for handlers registered through it, so the
//! registrations die with the context.

use std::sync::Arc;

use crate::executor::Executor;
use crate::release_pool::ReleasePool;

/// An object that owns an executor and the lifetime of its subscriptions.
///
/// Typical implementors are long-lived host objects — an actor, a service,
/// a view model — that want every callback bound to their own scheduling
/// context and automatically dropped with them.
pub trait ExecutionContext: Send + Sync + 'static {
    /// The executor callbacks bound to this context run on.
    fn executor(&self) -> Arc<dyn Executor>;

    /// The pool retaining this context's subscription handles.
    fn release_pool(&self) -> &ReleasePool;
}
