//! Immutable, reference-counted callback blocks.
//!
//! A block is a single allocation: a cache-line aligned header followed by
//! `len` callbacks. Once written a block is never modified; adding or
//! removing a callback builds a new block.
//!
//! ```text
//! ┌──────────────────────────────┐ offset 0, align 64
//! │ Header { ref_count, len }    │
//! ├──────────────────────────────┤ offset 64
//! │ Callback[0]                  │
//! │ Callback[1]                  │
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! The 64-byte alignment leaves the low six bits of every block address
//! zero, which the multicast delegate uses to count in-flight reader claims
//! next to the published pointer.

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::AtomicUsize;

use crate::callback::Callback;

/// Alignment of every block.
pub(crate) const BLOCK_ALIGN: usize = 64;

/// Low address bits free for tagging.
pub(crate) const TAG_MASK: usize = BLOCK_ALIGN - 1;

#[repr(C, align(64))]
pub(crate) struct Header {
    /// Owners: the published slot (if still published) plus every reader.
    pub ref_count: AtomicUsize,
    len: usize,
}

const _: () = assert!(std::mem::align_of::<Header>() == BLOCK_ALIGN);

/// Result of removing a callback from a block's contents.
pub(crate) enum Removal {
    /// The callback is not registered.
    NotFound,
    /// The callback was the only entry.
    Empty,
    /// A fresh block without the callback.
    Replaced(NonNull<Header>),
}

impl Header {
    fn layout_for<A: ?Sized>(len: usize) -> (Layout, usize) {
        let header = Layout::new::<Header>();
        let items = Layout::array::<Callback<A>>(len).expect("delegate too large");
        let (layout, offset) = header.extend(items).expect("layout overflow");
        (layout.pad_to_align(), offset)
    }

    /// Allocates a block holding `prefix` followed by `suffix`, with a
    /// reference count of one.
    ///
    /// Aborts through [`handle_alloc_error`] if the allocator fails.
    pub fn allocate<A: ?Sized>(
        prefix: &[Callback<A>],
        suffix: &[Callback<A>],
    ) -> NonNull<Header> {
        let len = prefix.len() + suffix.len();
        debug_assert!(len > 0, "empty blocks are never published");

        let (layout, offset) = Self::layout_for::<A>(len);
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        unsafe {
            ptr::write(
                ptr.cast::<Header>(),
                Header {
                    ref_count: AtomicUsize::new(1),
                    len,
                },
            );
            let items = ptr.add(offset).cast::<Callback<A>>();
            ptr::copy_nonoverlapping(prefix.as_ptr(), items, prefix.len());
            ptr::copy_nonoverlapping(suffix.as_ptr(), items.add(prefix.len()), suffix.len());
            NonNull::new_unchecked(ptr.cast())
        }
    }

    /// A block with `callback` appended to `existing`.
    pub fn with_appended<A: ?Sized>(
        existing: &[Callback<A>],
        callback: Callback<A>,
    ) -> NonNull<Header> {
        Self::allocate(existing, slice::from_ref(&callback))
    }

    /// A block without the last occurrence of `callback`.
    pub fn without<A: ?Sized>(existing: &[Callback<A>], callback: Callback<A>) -> Removal {
        match existing.iter().rposition(|c| *c == callback) {
            None => Removal::NotFound,
            Some(_) if existing.len() == 1 => Removal::Empty,
            Some(idx) => Removal::Replaced(Self::allocate(&existing[..idx], &existing[idx + 1..])),
        }
    }

    /// The callbacks stored in `this`.
    ///
    /// # Safety
    ///
    /// `this` must be a live block holding `Callback<A>`, and must outlive `'a`.
    #[inline]
    pub unsafe fn callbacks<'a, A: ?Sized>(this: NonNull<Header>) -> &'a [Callback<A>] {
        unsafe {
            let len = this.as_ref().len;
            let (_, offset) = Self::layout_for::<A>(len);
            let items = this.as_ptr().cast::<u8>().add(offset).cast::<Callback<A>>();
            slice::from_raw_parts(items, len)
        }
    }

    /// Frees `this`.
    ///
    /// # Safety
    ///
    /// `this` must be a block of `Callback<A>` from [`allocate`](Header::allocate)
    /// with no remaining users.
    pub unsafe fn destroy<A: ?Sized>(this: NonNull<Header>) {
        unsafe {
            let (layout, _) = Self::layout_for::<A>(this.as_ref().len);
            dealloc(this.as_ptr().cast(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &u32) {}

    fn with_ctx(_: &u32, _: &u8) {}

    static CTX: [u8; 4] = [0; 4];

    fn ctx(i: usize) -> Callback<u32> {
        Callback::with_context(with_ctx, &CTX[i])
    }

    #[test]
    fn block_is_aligned() {
        let block = Header::allocate(&[], &[Callback::from_fn(noop)]);
        assert_eq!(block.as_ptr().addr() & TAG_MASK, 0);
        unsafe { Header::destroy::<u32>(block) };
    }

    #[test]
    fn allocate_concatenates() {
        let a = [ctx(0), ctx(1)];
        let b = [ctx(2)];
        let block = Header::allocate(&a, &b);
        unsafe {
            assert_eq!(Header::callbacks::<u32>(block), &[ctx(0), ctx(1), ctx(2)]);
            Header::destroy::<u32>(block);
        }
    }

    #[test]
    fn without_removes_last_occurrence() {
        let items = [ctx(0), ctx(1), ctx(0), ctx(2)];
        let Removal::Replaced(block) = Header::without(&items, ctx(0)) else {
            panic!("expected a replacement block");
        };
        unsafe {
            assert_eq!(Header::callbacks::<u32>(block), &[ctx(0), ctx(1), ctx(2)]);
            Header::destroy::<u32>(block);
        }
    }

    #[test]
    fn without_missing_or_last() {
        // Same function, distinct contexts: only the context tells them apart.
        let single = [ctx(0)];
        assert!(matches!(Header::without(&single, ctx(1)), Removal::NotFound));
        assert!(matches!(Header::without(&single, ctx(0)), Removal::Empty));
    }
}
