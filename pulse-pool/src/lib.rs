//! Fixed-capacity object pool renting contiguous segments.
//!
//! The pool owns a fixed array of `T` and hands out [`Segment`]s: exclusive,
//! contiguous runs of slots found by a first-fit scan of a sorted free list.
//! Released segments are coalesced with their free neighbours, so once every
//! segment has come back the free list is a single chunk again. The pool
//! never grows; a request that no free run can satisfy fails.
//!
//! # Example
//!
//! ```
//! use pulse_pool::{FixedObjectPool, PoolBuilder, PoolError};
//!
//! let mut pool: FixedObjectPool<u32> = PoolBuilder::new().capacity(10).build()?;
//!
//! let a = pool.rent(3)?;
//! let b = pool.rent(4)?;
//! pool.get_mut(&a).fill(7);
//! assert_eq!(pool.get(&a), &[7, 7, 7]);
//!
//! pool.release(a)?;
//! pool.release(b)?;
//! assert_eq!(pool.free_chunks().len(), 1);
//! # Ok::<(), PoolError>(())
//! ```
//!
//! # Segments
//!
//! A [`Segment`] is a capability, not a borrow: it cannot be cloned, so it
//! can be released at most once, and it remembers which pool produced it.
//! Element access goes through the pool ([`get`](FixedObjectPool::get),
//! [`get_mut`](FixedObjectPool::get_mut)). Released slots keep their last
//! value; the pool does not reset them.

#![warn(missing_docs)]

mod free_list;

pub use free_list::Chunk;
use free_list::FreeList;

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

/// Capacity used when the builder is not given one.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Source of per-pool identities, so a segment can be traced to its pool.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Public Types
// =============================================================================

/// A contiguous run of slots rented from a [`FixedObjectPool`].
///
/// Must be handed back with [`FixedObjectPool::release`]. Dropping it instead
/// leaks the slots for the lifetime of the pool.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "segments must be released back to the pool they came from"]
pub struct Segment {
    pool: u64,
    offset: usize,
    len: usize,
}

impl Segment {
    /// Index of the first slot in the pool's backing array.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false` for segments handed out by a pool, which refuses
    /// empty requests.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `offset..offset + len`.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Errors from building or using a pool.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool was configured with zero slots.
    #[error("pool capacity cannot be zero")]
    ZeroCapacity,
    /// `rent(0)` was requested.
    #[error("cannot rent an empty segment")]
    EmptyRequest,
    /// No free run is long enough. The pool never grows.
    #[error("no free run of {requested} slots (largest free run is {largest_free})")]
    AllocationFailure {
        /// Slots asked for.
        requested: usize,
        /// Longest contiguous free run at the time of the request.
        largest_free: usize,
    },
    /// The segment was rented from a different pool. It is handed back
    /// untouched so the caller can return it to its owner.
    #[error("{0:?} was not rented from this pool")]
    InvalidSegment(Segment),
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`FixedObjectPool`].
#[derive(Clone, Debug, Default)]
pub struct PoolBuilder {
    capacity: Option<usize>,
}

impl PoolBuilder {
    /// A builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in the pool. Fixed for its whole lifetime.
    /// Default: [`DEFAULT_CAPACITY`].
    pub fn capacity(mut self, slots: usize) -> Self {
        self.capacity = Some(slots);
        self
    }

    /// Builds a pool with every slot set to `T::default()`.
    pub fn build<T: Default>(self) -> Result<FixedObjectPool<T>, PoolError> {
        self.build_with(T::default)
    }

    /// Builds a pool, filling each slot by calling `factory`.
    pub fn build_with<T, F>(self, factory: F) -> Result<FixedObjectPool<T>, PoolError>
    where
        F: FnMut() -> T,
    {
        let capacity = self.capacity.unwrap_or(DEFAULT_CAPACITY);
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let data: Box<[T]> = std::iter::repeat_with(factory).take(capacity).collect();
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        trace!(pool = id, capacity, "pool created");

        Ok(FixedObjectPool {
            id,
            data,
            free: FreeList::new(capacity),
            rented: 0,
        })
    }
}

// =============================================================================
// Pool
// =============================================================================

/// Fixed-capacity pool of `T` handing out contiguous [`Segment`]s.
///
/// Not internally synchronized; wrap it in a lock to share it between threads.
pub struct FixedObjectPool<T> {
    id: u64,
    data: Box<[T]>,
    free: FreeList,
    rented: usize,
}

impl<T: Default> FixedObjectPool<T> {
    /// Creates a pool of `capacity` default-initialized slots.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        PoolBuilder::new().capacity(capacity).build()
    }
}

impl<T> FixedObjectPool<T> {
    /// Rents `count` contiguous slots from the first free run long enough.
    ///
    /// # Errors
    ///
    /// [`PoolError::EmptyRequest`] for `count == 0`, and
    /// [`PoolError::AllocationFailure`] when no free run fits. A failed
    /// request leaves the pool unchanged.
    pub fn rent(&mut self, count: usize) -> Result<Segment, PoolError> {
        if count == 0 {
            return Err(PoolError::EmptyRequest);
        }

        let Some(idx) = self.free.first_fit(count) else {
            let largest_free = self.free.largest();
            debug!(
                pool = self.id,
                requested = count,
                largest_free,
                available = self.available(),
                "pool exhausted"
            );
            return Err(PoolError::AllocationFailure {
                requested: count,
                largest_free,
            });
        };

        let offset = self.free.take(idx, count);
        self.rented += count;
        trace!(pool = self.id, offset, len = count, "segment rented");

        Ok(Segment {
            pool: self.id,
            offset,
            len: count,
        })
    }

    /// Hands `segment` back, coalescing it with adjacent free runs.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidSegment`] if the segment came from another pool.
    /// The segment is returned inside the error.
    pub fn release(&mut self, segment: Segment) -> Result<(), PoolError> {
        if segment.pool != self.id {
            warn!(
                pool = self.id,
                owner = segment.pool,
                offset = segment.offset,
                len = segment.len,
                "released segment belongs to another pool"
            );
            return Err(PoolError::InvalidSegment(segment));
        }

        self.free.insert(segment.offset, segment.len);
        self.rented -= segment.len;
        trace!(
            pool = self.id,
            offset = segment.offset,
            len = segment.len,
            "segment released"
        );

        debug_assert_eq!(self.rented + self.free.total(), self.data.len());
        Ok(())
    }

    /// The slots covered by `segment`.
    ///
    /// # Panics
    ///
    /// Panics if the segment was rented from a different pool.
    pub fn get(&self, segment: &Segment) -> &[T] {
        assert_eq!(
            segment.pool, self.id,
            "segment was not rented from this pool"
        );
        &self.data[segment.range()]
    }

    /// Mutable access to the slots covered by `segment`.
    ///
    /// # Panics
    ///
    /// Panics if the segment was rented from a different pool.
    pub fn get_mut(&mut self, segment: &Segment) -> &mut [T] {
        assert_eq!(
            segment.pool, self.id,
            "segment was not rented from this pool"
        );
        &mut self.data[segment.range()]
    }

    /// Returns `true` if `segment` was rented from this pool.
    #[inline]
    pub fn owns(&self, segment: &Segment) -> bool {
        segment.pool == self.id
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of free slots, across all free runs.
    #[inline]
    pub fn available(&self) -> usize {
        self.data.len() - self.rented
    }

    /// Number of slots currently rented out.
    #[inline]
    pub fn rented(&self) -> usize {
        self.rented
    }

    /// Length of the longest free run: the largest request that can succeed.
    pub fn largest_free(&self) -> usize {
        self.free.largest()
    }

    /// The free list, sorted by offset.
    pub fn free_chunks(&self) -> &[Chunk] {
        self.free.as_slice()
    }

    /// Returns `true` if every slot is rented.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.rented == self.data.len()
    }
}

impl<T> fmt::Debug for FixedObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedObjectPool")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("rented", &self.rented)
            .field("free", &self.free.as_slice())
            .finish()
    }
}
