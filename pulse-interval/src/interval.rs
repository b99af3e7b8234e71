//! Half-open `[lower, upper)` interval arithmetic.

use core::fmt;

/// A half-open integer range `[lower, upper)`.
///
/// No ordering is imposed on the bounds: when `lower >= upper` the interval
/// is empty and [`length`](Interval::length) is zero or negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    lower: i32,
    upper: i32,
}

/// Outcome of [`Interval::subtract`].
///
/// Distinguishes "nothing to remove" from "everything removed", which a
/// bare count of remaining boundary points cannot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subtraction {
    /// The intervals do not overlap, or one of them is empty. The minuend is
    /// unchanged.
    Disjoint,
    /// The subtrahend covers the minuend entirely. Nothing remains.
    Eliminated,
    /// One end was cut off; the remainder is a single interval.
    Trimmed(Interval),
    /// A hole was punched into the middle; two remainders, in ascending order.
    Split(Interval, Interval),
}

impl Interval {
    /// Creates the interval `[lower, upper)`.
    #[inline]
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Inclusive lower bound.
    #[inline]
    pub const fn lower_bound(self) -> i32 {
        self.lower
    }

    /// Exclusive upper bound.
    #[inline]
    pub const fn upper_bound(self) -> i32 {
        self.upper
    }

    /// `upper - lower`. Zero or negative for empty intervals.
    #[inline]
    pub const fn length(self) -> i64 {
        self.upper as i64 - self.lower as i64
    }

    /// Returns `true` if the interval contains no integer.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.upper <= self.lower
    }

    /// Returns `true` if `lower <= x < upper`.
    #[inline]
    pub const fn contains(self, x: i32) -> bool {
        self.lower <= x && x < self.upper
    }

    /// Returns `true` if `other` lies within this interval's bounds.
    ///
    /// This is a pure bounds check, so an empty `other` is contained when its
    /// bounds fall inside ours.
    #[inline]
    pub const fn contains_interval(self, other: Interval) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    /// `[max(lower), min(upper))`. May be empty; check [`is_empty`](Interval::is_empty).
    #[inline]
    pub fn intersection(self, other: Interval) -> Interval {
        Interval::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    /// Returns `true` if the intersection is non-empty.
    #[inline]
    pub fn intersects(self, other: Interval) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Computes `self \ other`.
    ///
    /// Subtracting an empty interval, or subtracting from an empty interval,
    /// is [`Subtraction::Disjoint`]: nothing changes.
    pub fn subtract(self, other: Interval) -> Subtraction {
        if self.is_empty() || other.is_empty() {
            return Subtraction::Disjoint;
        }
        if other.upper <= self.lower || other.lower >= self.upper {
            return Subtraction::Disjoint;
        }

        let left = (other.lower > self.lower).then(|| Interval::new(self.lower, other.lower));
        let right = (other.upper < self.upper).then(|| Interval::new(other.upper, self.upper));

        match (left, right) {
            (None, None) => Subtraction::Eliminated,
            (Some(piece), None) | (None, Some(piece)) => Subtraction::Trimmed(piece),
            (Some(left), Some(right)) => Subtraction::Split(left, right),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

impl From<core::ops::Range<i32>> for Interval {
    fn from(range: core::ops::Range<i32>) -> Self {
        Interval::new(range.start, range.end)
    }
}

impl Subtraction {
    /// Returns `true` unless the minuend is left untouched.
    #[inline]
    pub const fn is_changed(&self) -> bool {
        !matches!(self, Subtraction::Disjoint)
    }

    /// The remaining pieces in ascending order, or `None` for [`Disjoint`](Subtraction::Disjoint).
    ///
    /// `Some` with an empty iterator means the minuend was eliminated.
    pub fn pieces(self) -> Option<impl Iterator<Item = Interval>> {
        let (first, second) = match self {
            Subtraction::Disjoint => return None,
            Subtraction::Eliminated => (None, None),
            Subtraction::Trimmed(piece) => (Some(piece), None),
            Subtraction::Split(left, right) => (Some(left), Some(right)),
        };
        Some(first.into_iter().chain(second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Basics
    // =========================================================================

    #[test]
    fn bounds_and_length() {
        let iv = Interval::new(3, 10);
        assert_eq!(iv.lower_bound(), 3);
        assert_eq!(iv.upper_bound(), 10);
        assert_eq!(iv.length(), 7);
        assert!(!iv.is_empty());
    }

    #[test]
    fn inverted_bounds_are_empty() {
        let iv = Interval::new(10, 3);
        assert!(iv.is_empty());
        assert_eq!(iv.length(), -7);
        assert!(!iv.contains(5));

        assert!(Interval::new(4, 4).is_empty());
    }

    #[test]
    fn length_does_not_overflow() {
        let iv = Interval::new(i32::MIN, i32::MAX);
        assert_eq!(iv.length(), u32::MAX as i64);
    }

    #[test]
    fn contains_is_half_open() {
        let iv = Interval::new(0, 4);
        assert!(iv.contains(0));
        assert!(iv.contains(3));
        assert!(!iv.contains(4));
        assert!(!iv.contains(-1));
    }

    #[test]
    fn contains_interval() {
        let outer = Interval::new(0, 10);
        assert!(outer.contains_interval(Interval::new(0, 10)));
        assert!(outer.contains_interval(Interval::new(2, 5)));
        assert!(!outer.contains_interval(Interval::new(-1, 5)));
        assert!(!outer.contains_interval(Interval::new(5, 11)));
    }

    #[test]
    fn display() {
        assert_eq!(Interval::new(-2, 7).to_string(), "[-2, 7)");
    }

    #[test]
    fn from_range() {
        assert_eq!(Interval::from(2..9), Interval::new(2, 9));
    }

    // =========================================================================
    // Intersection
    // =========================================================================

    #[test]
    fn intersection_overlapping() {
        let a = Interval::new(0, 10);
        let b = Interval::new(5, 15);
        assert_eq!(a.intersection(b), Interval::new(5, 10));
        assert_eq!(b.intersection(a), Interval::new(5, 10));
        assert!(a.intersects(b));
    }

    #[test]
    fn intersection_disjoint_is_empty() {
        let a = Interval::new(0, 4);
        let b = Interval::new(4, 8);
        assert!(a.intersection(b).is_empty());
        assert!(!a.intersects(b));
    }

    #[test]
    fn intersection_of_contained_is_inner() {
        let a = Interval::new(0, 10);
        let b = Interval::new(3, 6);
        assert!(a.contains_interval(b));
        assert_eq!(a.intersection(b), b);

        // Holds for an empty inner interval as well.
        let empty = Interval::new(6, 3);
        assert!(a.contains_interval(empty));
        assert_eq!(a.intersection(empty), empty);
    }

    // =========================================================================
    // Subtraction
    // =========================================================================

    #[test]
    fn subtract_disjoint() {
        let a = Interval::new(0, 4);
        assert_eq!(a.subtract(Interval::new(4, 8)), Subtraction::Disjoint);
        assert_eq!(a.subtract(Interval::new(-4, 0)), Subtraction::Disjoint);
        assert!(!a.subtract(Interval::new(10, 20)).is_changed());
    }

    #[test]
    fn subtract_empty_is_noop() {
        let a = Interval::new(0, 10);
        assert_eq!(a.subtract(Interval::new(5, 5)), Subtraction::Disjoint);
        assert_eq!(a.subtract(Interval::new(8, 2)), Subtraction::Disjoint);
    }

    #[test]
    fn subtract_from_empty_is_noop() {
        let a = Interval::new(5, 5);
        assert_eq!(a.subtract(Interval::new(0, 10)), Subtraction::Disjoint);
    }

    #[test]
    fn subtract_self_eliminates() {
        let a = Interval::new(-3, 12);
        assert_eq!(a.subtract(a), Subtraction::Eliminated);
    }

    #[test]
    fn subtract_cover_eliminates() {
        let a = Interval::new(2, 5);
        assert_eq!(a.subtract(Interval::new(0, 10)), Subtraction::Eliminated);
    }

    #[test]
    fn subtract_trims_left_and_right() {
        let a = Interval::new(0, 10);
        assert_eq!(
            a.subtract(Interval::new(-5, 3)),
            Subtraction::Trimmed(Interval::new(3, 10))
        );
        assert_eq!(
            a.subtract(Interval::new(7, 20)),
            Subtraction::Trimmed(Interval::new(0, 7))
        );
        assert_eq!(
            a.subtract(Interval::new(0, 3)),
            Subtraction::Trimmed(Interval::new(3, 10))
        );
    }

    #[test]
    fn subtract_splits() {
        let a = Interval::new(0, 10);
        assert_eq!(
            a.subtract(Interval::new(3, 6)),
            Subtraction::Split(Interval::new(0, 3), Interval::new(6, 10))
        );
    }

    #[test]
    fn pieces_view() {
        assert!(Subtraction::Disjoint.pieces().is_none());
        assert_eq!(Subtraction::Eliminated.pieces().unwrap().count(), 0);

        let split = Interval::new(0, 10).subtract(Interval::new(4, 5));
        let pieces: Vec<_> = split.pieces().unwrap().collect();
        assert_eq!(pieces, vec![Interval::new(0, 4), Interval::new(5, 10)]);
    }

    #[test]
    fn subtract_preserves_length_accounting() {
        let a = Interval::new(0, 100);
        for (lo, hi) in [(-10, 5), (10, 20), (90, 110), (0, 100), (50, 50), (200, 300)] {
            let b = Interval::new(lo, hi);
            let removed = a.intersection(b).length().max(0);
            let remaining: i64 = match a.subtract(b).pieces() {
                None => a.length(),
                Some(pieces) => pieces.map(Interval::length).sum(),
            };
            assert_eq!(remaining + removed, a.length(), "subtracting {b}");
        }
    }
}
