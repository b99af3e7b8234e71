//! Free-list bookkeeping for the fixed pool.
//!
//! Purely index arithmetic: the list never touches element storage, which is
//! owned by the pool in lib.rs.

/// A run of consecutive free slots, `[offset, offset + length)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Index of the first free slot.
    pub offset: usize,
    /// Number of free slots in the run.
    pub length: usize,
}

impl Chunk {
    /// One past the last slot of the run.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Free chunks sorted by offset, fully coalesced.
///
/// Never holds a zero-length chunk, and no chunk ends where the next one
/// starts. Since free chunks are separated by at least one rented slot, the
/// list can never hold more than `(size + 1) / 2` entries, so the storage
/// reserved up front is never outgrown.
#[derive(Debug)]
pub(crate) struct FreeList {
    chunks: Vec<Chunk>,
    size: usize,
}

impl FreeList {
    /// A list with the whole of `[0, size)` free.
    pub fn new(size: usize) -> Self {
        let mut chunks = Vec::with_capacity(size.div_ceil(2));
        if size > 0 {
            chunks.push(Chunk {
                offset: 0,
                length: size,
            });
        }
        Self { chunks, size }
    }

    /// Index of the first chunk with at least `count` slots.
    #[inline]
    pub fn first_fit(&self, count: usize) -> Option<usize> {
        self.chunks.iter().position(|c| c.length >= count)
    }

    /// Carves `count` slots off the front of chunk `idx`, returning their offset.
    pub fn take(&mut self, idx: usize, count: usize) -> usize {
        let chunk = &mut self.chunks[idx];
        debug_assert!(chunk.length >= count, "chunk too small: {chunk:?} < {count}");

        let offset = chunk.offset;
        chunk.offset += count;
        chunk.length -= count;
        if chunk.length == 0 {
            self.chunks.remove(idx);
        }
        offset
    }

    /// Returns `[offset, offset + length)` to the list, merging with the
    /// neighbouring chunks when they touch.
    pub fn insert(&mut self, offset: usize, length: usize) {
        debug_assert!(length > 0);
        debug_assert!(offset + length <= self.size, "run past end of pool");

        let end = offset + length;
        let idx = self.chunks.partition_point(|c| c.offset < offset);

        debug_assert!(
            idx == 0 || self.chunks[idx - 1].end() <= offset,
            "run [{offset}, {end}) overlaps free chunk {:?}",
            self.chunks[idx - 1]
        );
        debug_assert!(
            idx == self.chunks.len() || end <= self.chunks[idx].offset,
            "run [{offset}, {end}) overlaps free chunk {:?}",
            self.chunks[idx]
        );

        let joins_prev = idx > 0 && self.chunks[idx - 1].end() == offset;
        let joins_next = idx < self.chunks.len() && self.chunks[idx].offset == end;

        match (joins_prev, joins_next) {
            (true, true) => {
                let next = self.chunks.remove(idx);
                self.chunks[idx - 1].length += length + next.length;
            }
            (true, false) => self.chunks[idx - 1].length += length,
            (false, true) => {
                let next = &mut self.chunks[idx];
                next.offset = offset;
                next.length += length;
            }
            (false, false) => self.chunks.insert(idx, Chunk { offset, length }),
        }
    }

    /// Total number of free slots.
    pub fn total(&self) -> usize {
        self.chunks.iter().map(|c| c.length).sum()
    }

    /// Length of the largest free chunk, zero when nothing is free.
    pub fn largest(&self) -> usize {
        self.chunks.iter().map(|c| c.length).max().unwrap_or(0)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Chunk] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(list: &FreeList) -> Vec<(usize, usize)> {
        list.as_slice()
            .iter()
            .map(|c| (c.offset, c.length))
            .collect()
    }

    #[test]
    fn new_is_one_chunk() {
        let list = FreeList::new(10);
        assert_eq!(chunks(&list), vec![(0, 10)]);
        assert_eq!(list.total(), 10);
        assert_eq!(list.largest(), 10);
    }

    #[test]
    fn first_fit_skips_small_chunks() {
        let mut list = FreeList::new(10);
        list.take(0, 10);
        list.insert(0, 1);
        list.insert(3, 4);
        assert_eq!(list.first_fit(1), Some(0));
        assert_eq!(list.first_fit(2), Some(1));
        assert_eq!(list.first_fit(5), None);
    }

    #[test]
    fn take_shrinks_then_removes() {
        let mut list = FreeList::new(4);
        assert_eq!(list.take(0, 3), 0);
        assert_eq!(chunks(&list), vec![(3, 1)]);
        assert_eq!(list.take(0, 1), 3);
        assert!(list.as_slice().is_empty());
        assert_eq!(list.largest(), 0);
    }

    #[test]
    fn insert_without_neighbours() {
        let mut list = FreeList::new(10);
        list.take(0, 10);
        list.insert(4, 2);
        list.insert(0, 1);
        list.insert(8, 1);
        assert_eq!(chunks(&list), vec![(0, 1), (4, 2), (8, 1)]);
    }

    #[test]
    fn insert_joins_previous() {
        let mut list = FreeList::new(10);
        list.take(0, 10);
        list.insert(0, 2);
        list.insert(2, 3);
        assert_eq!(chunks(&list), vec![(0, 5)]);
    }

    #[test]
    fn insert_joins_next() {
        let mut list = FreeList::new(10);
        list.take(0, 10);
        list.insert(5, 5);
        list.insert(3, 2);
        assert_eq!(chunks(&list), vec![(3, 7)]);
    }

    #[test]
    fn insert_bridges_both() {
        let mut list = FreeList::new(10);
        list.take(0, 10);
        list.insert(0, 3);
        list.insert(7, 3);
        assert_eq!(list.as_slice().len(), 2);

        list.insert(3, 4);
        assert_eq!(chunks(&list), vec![(0, 10)]);
    }

    #[test]
    fn worst_case_fragmentation_fits_reserved_storage() {
        let mut list = FreeList::new(9);
        let reserved = list.chunks.capacity();
        list.take(0, 9);
        for offset in (0..9).step_by(2) {
            list.insert(offset, 1);
        }
        assert_eq!(list.as_slice().len(), 5);
        assert_eq!(list.chunks.capacity(), reserved);
    }
}
