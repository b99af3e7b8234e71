//! Half-open integer intervals and coalescing interval sets.
//!
//! Used to track which regions of a state buffer are dirty (or noisy) between
//! two update passes: writers [`add`](IntervalSet::add) touched byte ranges,
//! consumers [`subtract`](IntervalSet::subtract) the ranges they have already
//! processed, and whatever remains is still outstanding.
//!
//! # Example
//!
//! ```
//! use pulse_interval::{Interval, IntervalSet};
//!
//! let mut dirty = IntervalSet::new();
//! dirty.add(Interval::new(0, 8));
//! dirty.add(Interval::new(8, 16)); // adjacent, merged
//! assert_eq!(dirty.intervals(), &[Interval::new(0, 16)]);
//!
//! dirty.subtract(Interval::new(4, 12));
//! assert_eq!(dirty.intervals(), &[Interval::new(0, 4), Interval::new(12, 16)]);
//! assert_eq!(dirty.covered_length(), 8);
//! ```
//!
//! # Invariants
//!
//! An [`IntervalSet`] only stores non-empty intervals, sorted ascending by
//! lower bound, with at least a gap of one between consecutive entries
//! (overlapping or touching intervals are always merged). Debug builds check
//! this after every mutation.

#![warn(missing_docs)]

mod interval;
mod set;

pub use interval::{Interval, Subtraction};
pub use set::IntervalSet;
