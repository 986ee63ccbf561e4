//! The event sum delivered to stream subscribers.

use std::fmt;
use std::sync::Arc;

use weft::fallible::Fallible;

/// One delivery to a stream subscriber: an update, or the terminal
/// completion.
///
/// Payloads are shared (`Arc`) because one writer-side call fans out to
/// any number of subscribers; no `Clone` bound is put on the update or
/// success types.
pub enum StreamEvent<U, S> {
    /// A streamed value.
    Update(Arc<U>),
    /// The terminal success-or-failure. Delivered at most once per
    /// subscriber, always last.
    Completion(Arc<Fallible<S>>),
}

impl<U, S> StreamEvent<U, S> {
    /// Borrows the update payload, if this is an update.
    pub fn as_update(&self) -> Option<&U> {
        match self {
            StreamEvent::Update(value) => Some(value),
            StreamEvent::Completion(_) => None,
        }
    }

    /// Borrows the terminal value, if this is the completion.
    pub fn as_completion(&self) -> Option<&Fallible<S>> {
        match self {
            StreamEvent::Update(_) => None,
            StreamEvent::Completion(terminal) => Some(terminal),
        }
    }

    /// Returns `true` for the completion arm.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completion(_))
    }
}

impl<U, S> Clone for StreamEvent<U, S> {
    fn clone(&self) -> Self {
        match self {
            StreamEvent::Update(value) => StreamEvent::Update(value.clone()),
            StreamEvent::Completion(terminal) => StreamEvent::Completion(terminal.clone()),
        }
    }
}

impl<U: fmt::Debug, S: fmt::Debug> fmt::Debug for StreamEvent<U, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::Update(value) => f.debug_tuple("Update").field(value).finish(),
            StreamEvent::Completion(terminal) => {
                f.debug_tuple("Completion").field(terminal).finish()
            }
        }
    }
}
