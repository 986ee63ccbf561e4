//! Origin-tagged union for values merged from two heterogeneous sources.

use std::fmt;

/// A value that came from one of two sources.
///
/// Used as the update type of a heterogeneous merge so subscribers can
/// tell which upstream produced each update.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Either<L, R> {
    /// A value from the first source.
    Left(L),
    /// A value from the second source.
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Returns `true` for the left arm.
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    /// Returns `true` for the right arm.
    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    /// Borrows the left value, if any.
    pub fn left(&self) -> Option<&L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    /// Borrows the right value, if any.
    pub fn right(&self) -> Option<&R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Maps the left arm.
    pub fn map_left<T, F>(self, f: F) -> Either<T, R>
    where
        F: FnOnce(L) -> T,
    {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Maps the right arm.
    pub fn map_right<T, F>(self, f: F) -> Either<L, T>
    where
        F: FnOnce(R) -> T,
    {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }

    /// Collapses both arms into one value.
    pub fn either<T, F, G>(self, f: F, g: G) -> T
    where
        F: FnOnce(L) -> T,
        G: FnOnce(R) -> T,
    {
        match self {
            Either::Left(l) => f(l),
            Either::Right(r) => g(r),
        }
    }
}

impl<L: fmt::Debug, R: fmt::Debug> fmt::Debug for Either<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Either::Left(l) => f.debug_tuple("Left").field(l).finish(),
            Either::Right(r) => f.debug_tuple("Right").field(r).finish(),
        }
    }
}
