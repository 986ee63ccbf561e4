//! Success-or-failure sum carried through every fallible primitive.
//!
//! Errors in weft are values, never unwinding: a failure on one side of a
//! combinator fails the downstream by *completing* it with a
//! [`Fallible::Failure`], and callers that never look at the failure arm
//! simply never observe it. The library defines exactly two error kinds
//! of its own ([`WeftError`]); everything else is carried opaquely as a
//! [`Fault`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// An opaque, shareable caller error.
pub type Fault = Arc<dyn Error + Send + Sync + 'static>;

/// Wraps a concrete error into a [`Fault`].
pub fn fault<E>(err: E) -> Fault
where
    E: Error + Send + Sync + 'static,
{
    Arc::new(err)
}

/// The two library-defined error kinds.
///
/// Arbitrary caller errors travel as [`Fault`]; these are the only errors
/// weft itself produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeftError {
    /// The operation was cancelled through a [`CancellationToken`] or an
    /// explicit `cancel()` call.
    ///
    /// [`CancellationToken`]: crate::cancellation::CancellationToken
    Cancelled,
    /// A context-bound handler lost its weakly-held execution context
    /// before it could run.
    ContextDeallocated,
}

impl fmt::Display for WeftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeftError::Cancelled => write!(f, "operation was cancelled"),
            WeftError::ContextDeallocated => {
                write!(f, "execution context was deallocated before delivery")
            }
        }
    }
}

impl Error for WeftError {}

/// A success value or a failure, completed exactly once per primitive.
pub enum Fallible<S> {
    /// The operation produced a value.
    Success(S),
    /// The operation failed with an opaque error.
    Failure(Fault),
}

impl<S> Fallible<S> {
    /// A failure carrying [`WeftError::Cancelled`].
    pub fn cancelled() -> Self {
        Fallible::Failure(Arc::new(WeftError::Cancelled))
    }

    /// A failure carrying [`WeftError::ContextDeallocated`].
    pub fn context_deallocated() -> Self {
        Fallible::Failure(Arc::new(WeftError::ContextDeallocated))
    }

    /// Returns `true` for the success arm.
    pub fn is_success(&self) -> bool {
        matches!(self, Fallible::Success(_))
    }

    /// Returns `true` for the failure arm.
    pub fn is_failure(&self) -> bool {
        matches!(self, Fallible::Failure(_))
    }

    /// Returns `true` if this is a failure carrying [`WeftError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        match self {
            Fallible::Failure(fault) => {
                matches!(fault.downcast_ref::<WeftError>(), Some(WeftError::Cancelled))
            }
            Fallible::Success(_) => false,
        }
    }

    /// Borrows the success value, if any.
    pub fn success(&self) -> Option<&S> {
        match self {
            Fallible::Success(s) => Some(s),
            Fallible::Failure(_) => None,
        }
    }

    /// Borrows the failure, if any.
    pub fn failure(&self) -> Option<&Fault> {
        match self {
            Fallible::Success(_) => None,
            Fallible::Failure(fault) => Some(fault),
        }
    }

    /// Maps the success arm, passing failures through untouched.
    pub fn map<U, F>(self, f: F) -> Fallible<U>
    where
        F: FnOnce(S) -> U,
    {
        match self {
            Fallible::Success(s) => Fallible::Success(f(s)),
            Fallible::Failure(fault) => Fallible::Failure(fault),
        }
    }

    /// Chains a fallible computation off the success arm.
    pub fn and_then<U, F>(self, f: F) -> Fallible<U>
    where
        F: FnOnce(S) -> Fallible<U>,
    {
        match self {
            Fallible::Success(s) => f(s),
            Fallible::Failure(fault) => Fallible::Failure(fault),
        }
    }

    /// Converts into a `Result`, cloning nothing.
    pub fn into_result(self) -> Result<S, Fault> {
        match self {
            Fallible::Success(s) => Ok(s),
            Fallible::Failure(fault) => Err(fault),
        }
    }
}

impl<S: Clone> Clone for Fallible<S> {
    fn clone(&self) -> Self {
        match self {
            Fallible::Success(s) => Fallible::Success(s.clone()),
            Fallible::Failure(fault) => Fallible::Failure(fault.clone()),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Fallible<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallible::Success(s) => f.debug_tuple("Success").field(s).finish(),
            Fallible::Failure(fault) => f.debug_tuple("Failure").field(&fault.to_string()).finish(),
        }
    }
}

impl<S> From<Result<S, Fault>> for Fallible<S> {
    fn from(result: Result<S, Fault>) -> Self {
        match result {
            Ok(s) => Fallible::Success(s),
            Err(fault) => Fallible::Failure(fault),
        }
    }
}
