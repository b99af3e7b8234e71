//! Single-owner multicast delegate.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::block::{Header, Removal};
use crate::callback::Callback;

/// A multicast delegate without atomics.
///
/// Same copy-on-write block layout as [`MulticastDelegate`](crate::MulticastDelegate),
/// but mutation takes `&mut self` and frees the previous block immediately.
/// The borrow checker guarantees no invocation is running while a block is
/// replaced, so no reference counting is needed.
pub struct FastMulticastDelegate<A: ?Sized> {
    head: Option<NonNull<Header>>,
    _marker: PhantomData<fn(&A)>,
}

// SAFETY: the block is owned exclusively and immutable while shared.
unsafe impl<A: ?Sized> Send for FastMulticastDelegate<A> {}
unsafe impl<A: ?Sized> Sync for FastMulticastDelegate<A> {}

impl<A: ?Sized> FastMulticastDelegate<A> {
    /// Creates an empty delegate.
    pub const fn new() -> Self {
        Self {
            head: None,
            _marker: PhantomData,
        }
    }

    /// Appends `callback`.
    pub fn add(&mut self, callback: Callback<A>) {
        let block = Header::with_appended(self.callbacks(), callback);
        self.replace(Some(block));
    }

    /// Removes the most recently added registration of `callback`. Returns
    /// `false` if it is not registered.
    pub fn remove(&mut self, callback: Callback<A>) -> bool {
        match Header::without(self.callbacks(), callback) {
            Removal::NotFound => false,
            Removal::Empty => {
                self.replace(None);
                true
            }
            Removal::Replaced(block) => {
                self.replace(Some(block));
                true
            }
        }
    }

    /// Calls every registered callback with `arg`, in registration order.
    #[inline]
    pub fn invoke(&self, arg: &A) {
        for callback in self.callbacks() {
            callback.invoke(arg);
        }
    }

    /// The invocation list.
    pub fn callbacks(&self) -> &[Callback<A>] {
        match self.head {
            // SAFETY: owned by `self`, only freed through `&mut self`.
            Some(block) => unsafe { Header::callbacks::<A>(block) },
            None => &[],
        }
    }

    /// Number of registered callbacks.
    #[inline]
    pub fn len(&self) -> usize {
        self.callbacks().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Unregisters everything and frees the block.
    pub fn clear(&mut self) {
        self.replace(None);
    }

    fn replace(&mut self, block: Option<NonNull<Header>>) {
        if let Some(old) = std::mem::replace(&mut self.head, block) {
            // SAFETY: the old block was exclusively ours.
            unsafe { Header::destroy::<A>(old) };
        }
    }
}

impl<A: ?Sized> Default for FastMulticastDelegate<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Drop for FastMulticastDelegate<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<A: ?Sized> fmt::Debug for FastMulticastDelegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.callbacks()).finish()
    }
}
