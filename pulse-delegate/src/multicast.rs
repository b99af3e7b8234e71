//! Lock-free copy-on-write multicast delegate.
//!
//! The delegate publishes one immutable [block](crate::block) through an
//! atomic pointer. Writers build a replacement block and swap it in with a
//! compare-and-swap; readers pin the current block and iterate it without
//! further synchronization.
//!
//! # Reader pinning
//!
//! Loading the pointer and then incrementing the block's reference count is
//! not atomic: between the two steps a writer could swap the block out and
//! free it. The delegate therefore keeps a split reference count. The low
//! bits of the published pointer (free because blocks are 64-byte aligned)
//! count *claims*: a reader first bumps the claim count with a CAS on the
//! pointer itself, which can only succeed while the block is still
//! published. Holding a claim, it increments the block's own count, then
//! gives the claim back.
//!
//! A writer that swaps a block out observes the outstanding claims in the
//! pointer it replaced and moves them into the block's count. A reader that
//! finds its block already replaced gives its claim back by decrementing the
//! block's count instead. Either way every claim is paid back exactly once.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use tracing::trace;

use crate::block::{Header, Removal, TAG_MASK};
use crate::callback::Callback;

#[inline]
fn untagged(ptr: *mut Header) -> *mut Header {
    ptr.map_addr(|addr| addr & !TAG_MASK)
}

#[inline]
fn claims(ptr: *mut Header) -> usize {
    ptr.addr() & TAG_MASK
}

/// A thread-safe multicast delegate.
///
/// [`add`](Self::add), [`remove`](Self::remove) and [`invoke`](Self::invoke)
/// may run concurrently from any number of threads. Mutations are
/// linearized by a CAS on the published block and retried on contention.
/// An invocation calls the callbacks registered when it started, in
/// registration order; changes made while it runs are seen by the next one.
///
/// # Example
///
/// ```
/// use pulse_delegate::{Callback, MulticastDelegate};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// static TOTAL: AtomicU64 = AtomicU64::new(0);
///
/// fn accumulate(v: &u64) {
///     TOTAL.fetch_add(*v, Ordering::Relaxed);
/// }
///
/// let delegate = MulticastDelegate::new();
/// let cb = Callback::from_fn(accumulate);
/// delegate.add(cb);
/// delegate.invoke(&5);
/// assert!(delegate.remove(cb));
/// delegate.invoke(&5);
/// assert_eq!(TOTAL.load(Ordering::Relaxed), 5);
/// ```
pub struct MulticastDelegate<A: ?Sized> {
    /// Published block, tagged with the number of in-flight claims.
    head: CachePadded<AtomicPtr<Header>>,
    /// Blocks allocated by this delegate and not yet freed.
    live_blocks: AtomicUsize,
    _marker: PhantomData<fn(&A)>,
}

impl<A: ?Sized> MulticastDelegate<A> {
    /// Creates an empty delegate. Does not allocate.
    pub const fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            live_blocks: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Appends `callback`. Adding the same callback twice registers it twice.
    pub fn add(&self, callback: Callback<A>) {
        let backoff = Backoff::new();

        loop {
            match self.acquire() {
                None => {
                    let block = self.allocate(&[], std::slice::from_ref(&callback));
                    if self
                        .head
                        .compare_exchange(
                            ptr::null_mut(),
                            block.as_ptr(),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }
                    // SAFETY: never published.
                    unsafe { self.free(block) };
                }
                Some(current) => {
                    // SAFETY: pinned by `acquire`.
                    let items = unsafe { Header::callbacks::<A>(current) };
                    let block = Header::with_appended(items, callback);
                    self.live_blocks.fetch_add(1, Ordering::Relaxed);
                    // SAFETY: `current` pinned by us, `block` fresh.
                    if unsafe { self.publish(current, block.as_ptr()) } {
                        return;
                    }
                }
            }
            trace!("delegate add lost a race, retrying");
            backoff.spin();
        }
    }

    /// Removes the most recently added registration of `callback`.
    ///
    /// Returns `false`, leaving the delegate untouched, if it is not
    /// registered.
    pub fn remove(&self, callback: Callback<A>) -> bool {
        let backoff = Backoff::new();

        loop {
            let Some(current) = self.acquire() else {
                return false;
            };
            // SAFETY: pinned by `acquire`.
            let items = unsafe { Header::callbacks::<A>(current) };
            let replacement = match Header::without(items, callback) {
                Removal::NotFound => {
                    // SAFETY: releases the pin taken above.
                    unsafe { self.release(current) };
                    return false;
                }
                Removal::Empty => ptr::null_mut(),
                Removal::Replaced(block) => {
                    self.live_blocks.fetch_add(1, Ordering::Relaxed);
                    block.as_ptr()
                }
            };
            // SAFETY: `current` pinned by us, `replacement` fresh or null.
            if unsafe { self.publish(current, replacement) } {
                return true;
            }
            trace!("delegate remove lost a race, retrying");
            backoff.spin();
        }
    }

    /// Calls every registered callback with `arg`, in registration order.
    ///
    /// Does nothing, without touching any reference count, when empty. A
    /// panicking callback unwinds through here with the block still
    /// correctly released.
    pub fn invoke(&self, arg: &A) {
        if let Some(snapshot) = self.snapshot() {
            for callback in snapshot.iter() {
                callback.invoke(arg);
            }
        }
    }

    /// Pins the current invocation list.
    ///
    /// The snapshot is immutable and stays valid while the delegate keeps
    /// changing. Returns `None` when nothing is registered.
    pub fn snapshot(&self) -> Option<Snapshot<'_, A>> {
        self.acquire().map(|block| Snapshot { owner: self, block })
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |s| s.len())
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        untagged(self.head.load(Ordering::Acquire)).is_null()
    }

    /// Unregisters everything. Invocations already running finish on their
    /// snapshot.
    pub fn clear(&self) {
        let backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Acquire);

        loop {
            let Some(block) = NonNull::new(untagged(current)) else {
                return;
            };
            match self.head.compare_exchange_weak(
                current,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: just unpublished with `claims(current)` outstanding.
                    unsafe { self.retire(block, claims(current)) };
                    return;
                }
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Blocks allocated by this delegate and not yet freed: the published
    /// block plus any retired block a reader still holds.
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.load(Ordering::Acquire)
    }

    // =========================================================================
    // Reference counting
    // =========================================================================

    fn allocate(&self, prefix: &[Callback<A>], suffix: &[Callback<A>]) -> NonNull<Header> {
        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        Header::allocate(prefix, suffix)
    }

    /// # Safety
    ///
    /// `block` must have been allocated by this delegate and have no users.
    unsafe fn free(&self, block: NonNull<Header>) {
        unsafe { Header::destroy::<A>(block) };
        self.live_blocks.fetch_sub(1, Ordering::Release);
    }

    /// Pins the published block, returning it with one reference owned by
    /// the caller.
    fn acquire(&self) -> Option<NonNull<Header>> {
        let backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Acquire);

        let block = loop {
            let block = NonNull::new(untagged(current))?;
            if claims(current) == TAG_MASK {
                // Claim counter saturated; wait for readers to drain it.
                backoff.snooze();
                current = self.head.load(Ordering::Acquire);
                continue;
            }
            match self.head.compare_exchange_weak(
                current,
                current.map_addr(|addr| addr + 1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break block,
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        };

        // SAFETY: our claim keeps `block` alive until it is given back.
        unsafe { block.as_ref() }
            .ref_count
            .fetch_add(1, Ordering::Relaxed);
        self.return_claim(block);
        Some(block)
    }

    /// Gives back a claim taken in `acquire`, after the block's own count
    /// has been incremented.
    fn return_claim(&self, block: NonNull<Header>) {
        let mut current = self.head.load(Ordering::Acquire);

        loop {
            if untagged(current) != block.as_ptr() {
                // Swapped out: the writer moved our claim into ref_count.
                // Cannot reach zero, we still hold our own reference.
                unsafe { block.as_ref() }
                    .ref_count
                    .fetch_sub(1, Ordering::AcqRel);
                return;
            }
            debug_assert!(claims(current) > 0, "claim vanished from published block");
            match self.head.compare_exchange_weak(
                current,
                current.map_addr(|addr| addr - 1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Drops one reference, freeing the block on the last one.
    ///
    /// # Safety
    ///
    /// The caller must own a reference to `block`.
    unsafe fn release(&self, block: NonNull<Header>) {
        if unsafe { block.as_ref() }
            .ref_count
            .fetch_sub(1, Ordering::AcqRel)
            == 1
        {
            unsafe { self.free(block) };
        }
    }

    /// Settles a block that was just unpublished while `claims` readers were
    /// between claiming and returning it.
    ///
    /// # Safety
    ///
    /// `block` must have just been swapped out of `head`.
    unsafe fn retire(&self, block: NonNull<Header>, claims: usize) {
        match claims {
            0 => unsafe { self.release(block) },
            // The slot's reference becomes the single claim's.
            1 => {}
            n => {
                trace!(claims = n, "retiring block with pinned readers");
                unsafe { block.as_ref() }
                    .ref_count
                    .fetch_add(n - 1, Ordering::Relaxed);
            }
        }
    }

    /// Swaps `expected` for `replacement` if it is still published.
    ///
    /// Consumes the caller's reference on `expected` and ownership of
    /// `replacement` (which may be null) either way. Claims appearing on
    /// `expected` while this runs do not force a rebuild.
    ///
    /// # Safety
    ///
    /// The caller must own a reference to `expected`, and `replacement`
    /// must be null or a fresh block from this delegate.
    unsafe fn publish(&self, expected: NonNull<Header>, replacement: *mut Header) -> bool {
        let backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Acquire);

        loop {
            if untagged(current) != expected.as_ptr() {
                unsafe {
                    self.release(expected);
                    if let Some(block) = NonNull::new(replacement) {
                        self.free(block);
                    }
                }
                return false;
            }
            match self.head.compare_exchange_weak(
                current,
                replacement,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    unsafe {
                        self.retire(expected, claims(current));
                        self.release(expected);
                    }
                    return true;
                }
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }
}

impl<A: ?Sized> Default for MulticastDelegate<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Drop for MulticastDelegate<A> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        if let Some(block) = NonNull::new(untagged(head)) {
            debug_assert_eq!(claims(head), 0);
            // Snapshots borrow the delegate, so the slot is the only owner.
            unsafe { self.free(block) };
        }
    }
}

impl<A: ?Sized> fmt::Debug for MulticastDelegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastDelegate")
            .field("len", &self.len())
            .field("live_blocks", &self.live_blocks())
            .finish()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// A pinned, immutable view of a delegate's invocation list.
///
/// Holding a snapshot keeps its block alive; dropping it releases the pin.
pub struct Snapshot<'a, A: ?Sized> {
    owner: &'a MulticastDelegate<A>,
    block: NonNull<Header>,
}

impl<A: ?Sized> Deref for Snapshot<'_, A> {
    type Target = [Callback<A>];

    fn deref(&self) -> &[Callback<A>] {
        // SAFETY: pinned until drop.
        unsafe { Header::callbacks::<A>(self.block) }
    }
}

impl<A: ?Sized> Drop for Snapshot<'_, A> {
    fn drop(&mut self) {
        // SAFETY: the pin taken when the snapshot was created.
        unsafe { self.owner.release(self.block) };
    }
}

impl<A: ?Sized> fmt::Debug for Snapshot<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
