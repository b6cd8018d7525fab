//! The [`Matcher`] abstraction.

use std::fmt;

/// Predicate over candidates of type `T`.
///
/// Implemented by literal equality ([`Exact`]), the segment sequence
/// matcher ([`SegmentMatcher`](crate::SegmentMatcher)) and compound
/// matchers such as [`PermissionComparator`](crate::PermissionComparator).
pub trait Matcher<T: ?Sized>: Send + Sync {
    /// Whether `candidate` is matched.
    fn matches(&self, candidate: &T) -> bool;
}

/// Matches candidates equal to a fixed value.
#[derive(Clone, PartialEq, Eq)]
pub struct Exact<T>(pub T);

impl<T> Matcher<T> for Exact<T>
where
    T: PartialEq + Send + Sync,
{
    fn matches(&self, candidate: &T) -> bool {
        self.0 == *candidate
    }
}

impl<T: fmt::Debug> fmt::Debug for Exact<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exact({:?})", self.0)
    }
}

/// Matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anything;

impl<T: ?Sized> Matcher<T> for Anything {
    fn matches(&self, _candidate: &T) -> bool {
        true
    }
}

impl<T: ?Sized, M: Matcher<T> + ?Sized> Matcher<T> for Box<M> {
    fn matches(&self, candidate: &T) -> bool {
        (**self).matches(candidate)
    }
}
