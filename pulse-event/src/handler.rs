//! Shareable event handler with auto-unsubscribing subscriptions.

use std::fmt;
use std::sync::{Arc, Weak};

use pulse_delegate::{Callback, MulticastDelegate};
use tracing::trace;

use crate::disposable::Disposable;

/// A thread-safe event: a cloneable handle to a shared [`MulticastDelegate`].
///
/// Clones refer to the same invocation list.
pub struct EventHandler<A: ?Sized> {
    delegate: Arc<MulticastDelegate<A>>,
}

impl<A: ?Sized> EventHandler<A> {
    /// Creates an event with no subscribers.
    pub fn new() -> Self {
        Self {
            delegate: Arc::new(MulticastDelegate::new()),
        }
    }

    /// Registers `callback` without a subscription handle.
    pub fn add(&self, callback: Callback<A>) {
        self.delegate.add(callback);
    }

    /// Unregisters one registration of `callback`. Returns `false` if none
    /// exists.
    pub fn remove(&self, callback: Callback<A>) -> bool {
        self.delegate.remove(callback)
    }

    /// Registers `callback` and returns a handle that unregisters it when
    /// disposed or dropped.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, callback: Callback<A>) -> EventSubscription<A> {
        self.delegate.add(callback);
        trace!(?callback, "event subscribed");
        EventSubscription {
            owner: Arc::downgrade(&self.delegate),
            callback: Some(callback),
        }
    }

    /// Calls every subscriber with `arg` on the calling thread.
    #[inline]
    pub fn invoke(&self, arg: &A) {
        self.delegate.invoke(arg);
    }

    /// Returns `true` if anything is registered.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        !self.delegate.is_empty()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delegate.is_empty()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.delegate.len()
    }

    /// Drops every registration. Outstanding subscriptions become no-ops.
    pub fn dispose(&self) {
        self.delegate.clear();
    }
}

impl<A: ?Sized> Clone for EventHandler<A> {
    fn clone(&self) -> Self {
        Self {
            delegate: Arc::clone(&self.delegate),
        }
    }
}

impl<A: ?Sized> Default for EventHandler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for EventHandler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("len", &self.len())
            .finish()
    }
}

/// Registration of one callback on an [`EventHandler`].
///
/// Disposing (or dropping) removes exactly that registration once. If the
/// handler is already gone, disposal does nothing. An invocation already
/// running on another thread is not waited for.
pub struct EventSubscription<A: ?Sized> {
    owner: Weak<MulticastDelegate<A>>,
    callback: Option<Callback<A>>,
}

impl<A: ?Sized> EventSubscription<A> {
    /// Unregisters the callback. Idempotent.
    pub fn dispose(&mut self) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        if let Some(delegate) = self.owner.upgrade() {
            let removed = delegate.remove(callback);
            trace!(?callback, removed, "event subscription disposed");
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.callback.is_none()
    }

    /// Gives up the handle while leaving the callback registered. Returns the
    /// callback, or `None` if already disposed.
    pub fn detach(mut self) -> Option<Callback<A>> {
        self.callback.take()
    }
}

impl<A: ?Sized> Disposable for EventSubscription<A> {
    fn dispose(&mut self) {
        EventSubscription::dispose(self);
    }
}

impl<A: ?Sized> Drop for EventSubscription<A> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<A: ?Sized> fmt::Debug for EventSubscription<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("callback", &self.callback)
            .finish()
    }
}
