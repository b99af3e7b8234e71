//! Sorted, coalescing set of intervals.

use smallvec::SmallVec;

use crate::interval::{Interval, Subtraction};

/// Intervals stored inline before spilling to the heap.
const INLINE_INTERVALS: usize = 4;

/// An ordered set of disjoint, non-adjacent, non-empty intervals.
///
/// The set exclusively owns its storage; dropping it releases the backing
/// buffer. Not internally synchronized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; INLINE_INTERVALS]>,
}

impl IntervalSet {
    /// Creates an empty set.
    #[inline]
    pub fn new() -> Self {
        Self {
            intervals: SmallVec::new(),
        }
    }

    /// Creates an empty set able to hold `capacity` intervals without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            intervals: SmallVec::with_capacity(capacity),
        }
    }

    /// Inserts `interval`, merging it with every stored interval it overlaps
    /// or touches. Empty intervals are ignored.
    pub fn add(&mut self, interval: Interval) {
        if interval.is_empty() {
            return;
        }

        let lower = interval.lower_bound();
        let upper = interval.upper_bound();

        // [start, end) are the stored intervals that overlap or touch `interval`.
        let start = self.intervals.partition_point(|iv| iv.upper_bound() < lower);
        let end = self.intervals.partition_point(|iv| iv.lower_bound() <= upper);

        if start == end {
            self.intervals.insert(start, interval);
        } else {
            let merged = Interval::new(
                lower.min(self.intervals[start].lower_bound()),
                upper.max(self.intervals[end - 1].upper_bound()),
            );
            self.intervals[start] = merged;
            self.intervals.drain(start + 1..end);
        }

        debug_assert!(self.is_well_formed(), "invariant broken after add: {self:?}");
    }

    /// Removes `interval` from every stored interval it intersects.
    ///
    /// Each affected entry is replaced by zero, one or two remainders in
    /// place, so sort order is preserved. Empty intervals are ignored.
    pub fn subtract(&mut self, interval: Interval) {
        if interval.is_empty() || self.intervals.is_empty() {
            return;
        }

        let lower = interval.lower_bound();
        let upper = interval.upper_bound();

        // [start, end) are the stored intervals that intersect `interval`.
        let start = self.intervals.partition_point(|iv| iv.upper_bound() <= lower);
        let end = self.intervals.partition_point(|iv| iv.lower_bound() < upper);
        if start >= end {
            return;
        }

        // Only the first and last affected entries can leave anything behind.
        let mut remainder: SmallVec<[Interval; 2]> = SmallVec::new();
        for stored in &self.intervals[start..end] {
            match stored.subtract(interval) {
                Subtraction::Disjoint => remainder.push(*stored),
                Subtraction::Eliminated => {}
                Subtraction::Trimmed(piece) => remainder.push(piece),
                Subtraction::Split(left, right) => {
                    remainder.push(left);
                    remainder.push(right);
                }
            }
        }

        self.intervals.drain(start..end);
        self.intervals.insert_many(start, remainder);

        debug_assert!(self.is_well_formed(), "invariant broken after subtract: {self:?}");
    }

    /// Returns `true` if some stored interval contains `x`.
    pub fn contains(&self, x: i32) -> bool {
        let idx = self.intervals.partition_point(|iv| iv.upper_bound() <= x);
        self.intervals.get(idx).is_some_and(|iv| iv.contains(x))
    }

    /// Returns `true` if a single stored interval covers all of `interval`.
    ///
    /// An empty interval is always covered.
    pub fn contains_interval(&self, interval: Interval) -> bool {
        if interval.is_empty() {
            return true;
        }
        let idx = self
            .intervals
            .partition_point(|iv| iv.upper_bound() <= interval.lower_bound());
        self.intervals
            .get(idx)
            .is_some_and(|iv| iv.contains_interval(interval))
    }

    /// The stored intervals, ascending.
    #[inline]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Iterates the stored intervals in ascending order.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    /// Number of stored (maximal) intervals.
    #[inline]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns `true` if the set covers nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Total number of integers covered by the set.
    pub fn covered_length(&self) -> i64 {
        self.intervals.iter().map(|iv| iv.length()).sum()
    }

    /// Removes every interval, keeping the allocation.
    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    fn is_well_formed(&self) -> bool {
        self.intervals.iter().all(|iv| !iv.is_empty())
            && self
                .intervals
                .windows(2)
                .all(|pair| pair[0].upper_bound() < pair[1].lower_bound())
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a Interval;
    type IntoIter = core::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl Extend<Interval> for IntervalSet {
    fn extend<I: IntoIterator<Item = Interval>>(&mut self, iter: I) {
        for interval in iter {
            self.add(interval);
        }
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        let mut set = IntervalSet::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: &[(i32, i32)]) -> IntervalSet {
        ranges.iter().map(|&(lo, hi)| Interval::new(lo, hi)).collect()
    }

    fn bounds(set: &IntervalSet) -> Vec<(i32, i32)> {
        set.iter()
            .map(|iv| (iv.lower_bound(), iv.upper_bound()))
            .collect()
    }

    // =========================================================================
    // Add
    // =========================================================================

    #[test]
    fn add_to_empty() {
        let mut s = IntervalSet::new();
        s.add(Interval::new(2, 5));
        assert_eq!(bounds(&s), vec![(2, 5)]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn add_empty_is_ignored() {
        let mut s = IntervalSet::new();
        s.add(Interval::new(5, 5));
        s.add(Interval::new(9, 1));
        assert!(s.is_empty());
    }

    #[test]
    fn add_keeps_sort_order() {
        let s = set(&[(20, 30), (0, 5), (10, 15)]);
        assert_eq!(bounds(&s), vec![(0, 5), (10, 15), (20, 30)]);
    }

    #[test]
    fn add_merges_overlapping() {
        let s = set(&[(0, 5), (3, 8)]);
        assert_eq!(bounds(&s), vec![(0, 8)]);
    }

    #[test]
    fn add_merges_adjacent() {
        let s = set(&[(0, 5), (5, 8)]);
        assert_eq!(bounds(&s), vec![(0, 8)]);

        let s = set(&[(5, 8), (0, 5)]);
        assert_eq!(bounds(&s), vec![(0, 8)]);
    }

    #[test]
    fn add_bridges_many() {
        let mut s = set(&[(0, 2), (4, 6), (8, 10), (20, 22)]);
        s.add(Interval::new(1, 9));
        assert_eq!(bounds(&s), vec![(0, 10), (20, 22)]);
    }

    #[test]
    fn add_contained_is_noop() {
        let mut s = set(&[(0, 10)]);
        s.add(Interval::new(3, 4));
        assert_eq!(bounds(&s), vec![(0, 10)]);
    }

    #[test]
    fn add_gap_of_one_stays_separate() {
        let s = set(&[(0, 5), (6, 8)]);
        assert_eq!(bounds(&s), vec![(0, 5), (6, 8)]);
    }

    // =========================================================================
    // Subtract
    // =========================================================================

    #[test]
    fn subtract_splits_single() {
        let mut s = set(&[(0, 10)]);
        s.subtract(Interval::new(3, 6));
        assert_eq!(bounds(&s), vec![(0, 3), (6, 10)]);
    }

    #[test]
    fn subtract_eliminates_and_trims_across_entries() {
        let mut s = set(&[(0, 4), (6, 8), (10, 14)]);
        s.subtract(Interval::new(2, 12));
        assert_eq!(bounds(&s), vec![(0, 2), (12, 14)]);
    }

    #[test]
    fn subtract_everything() {
        let mut s = set(&[(0, 4), (6, 8)]);
        s.subtract(Interval::new(-100, 100));
        assert!(s.is_empty());
        assert_eq!(s.covered_length(), 0);
    }

    #[test]
    fn subtract_disjoint_keeps_entries() {
        let mut s = set(&[(0, 4), (10, 14)]);
        s.subtract(Interval::new(4, 10));
        assert_eq!(bounds(&s), vec![(0, 4), (10, 14)]);
        s.subtract(Interval::new(20, 30));
        assert_eq!(bounds(&s), vec![(0, 4), (10, 14)]);
    }

    #[test]
    fn subtract_empty_is_noop() {
        let mut s = set(&[(0, 10)]);
        s.subtract(Interval::new(5, 5));
        s.subtract(Interval::new(8, 2));
        assert_eq!(bounds(&s), vec![(0, 10)]);
    }

    #[test]
    fn subtract_from_empty_set() {
        let mut s = IntervalSet::new();
        s.subtract(Interval::new(0, 10));
        assert!(s.is_empty());
    }

    #[test]
    fn subtract_exact_entry_keeps_neighbours() {
        let mut s = set(&[(0, 2), (4, 6), (8, 10)]);
        s.subtract(Interval::new(4, 6));
        assert_eq!(bounds(&s), vec![(0, 2), (8, 10)]);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn contains_points() {
        let s = set(&[(0, 4), (10, 14)]);
        assert!(s.contains(0));
        assert!(s.contains(3));
        assert!(!s.contains(4));
        assert!(!s.contains(9));
        assert!(s.contains(13));
        assert!(!s.contains(14));
        assert!(!s.contains(-1));
    }

    #[test]
    fn contains_interval_needs_single_entry() {
        let s = set(&[(0, 4), (5, 8)]);
        assert!(s.contains_interval(Interval::new(1, 3)));
        assert!(s.contains_interval(Interval::new(5, 8)));
        assert!(!s.contains_interval(Interval::new(3, 6)));
        assert!(s.contains_interval(Interval::new(100, 100)));
    }

    #[test]
    fn covered_length_sums_entries() {
        let s = set(&[(0, 4), (10, 15), (-5, -3)]);
        assert_eq!(s.covered_length(), 11);
    }

    #[test]
    fn clear_empties() {
        let mut s = set(&[(0, 4), (10, 15)]);
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn spills_past_inline_capacity() {
        let mut s = IntervalSet::with_capacity(2);
        for i in 0..32 {
            s.add(Interval::new(i * 4, i * 4 + 2));
        }
        assert_eq!(s.len(), 32);
        assert_eq!(s.covered_length(), 64);
        assert!(s.is_well_formed());
    }
}
