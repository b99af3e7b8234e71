//! Single-threaded observer fan-out with cascading upstream disposal.
//!
//! An [`ObserverList`] broadcasts values to its observers. It may own a set of
//! upstream [`Disposable`]s (typically the subscriptions that feed it); those
//! are disposed the moment the last observer unsubscribes, which lets chained
//! lists tear down from the leaf back to the source.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::mem;
use std::ptr;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::disposable::Disposable;

/// Receives values pushed by a source.
pub trait Observer<T> {
    /// Called for each value.
    fn on_next(&self, value: &T);

    /// Called when the source finishes.
    fn on_completed(&self) {}

    /// Called when the source fails.
    fn on_error(&self, error: &dyn Error) {
        warn!(%error, "observer error not handled");
    }
}

/// Adapter turning a closure into an [`Observer`]. See [`observer_fn`].
pub struct FnObserver<F>(F);

impl<T, F: Fn(&T)> Observer<T> for FnObserver<F> {
    #[inline]
    fn on_next(&self, value: &T) {
        (self.0)(value);
    }
}

/// Wraps `f` into an [`Observer`] that only handles `on_next`.
pub fn observer_fn<T, F: Fn(&T)>(f: F) -> FnObserver<F> {
    FnObserver(f)
}

type Observers<T> = Rc<Vec<Rc<dyn Observer<T>>>>;

struct Inner<T> {
    // Replaced wholesale on mutation while a broadcast holds the old one.
    observers: Observers<T>,
    upstream: Vec<Box<dyn Disposable>>,
}

/// A single-threaded list of observers.
///
/// Cloning yields another handle to the same list. Broadcasting iterates a
/// snapshot, so observers may subscribe or unsubscribe from inside a callback;
/// such changes take effect from the next broadcast.
pub struct ObserverList<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> ObserverList<T> {
    /// Creates an empty list with no upstream.
    pub fn new() -> Self {
        Self::with_upstream(Vec::new())
    }

    /// Creates an empty list that disposes `upstream` once its last observer
    /// leaves.
    pub fn with_upstream(upstream: Vec<Box<dyn Disposable>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                observers: Rc::new(Vec::new()),
                upstream,
            })),
        }
    }

    /// Replaces the upstream disposables and hands back the previous set
    /// undisposed.
    ///
    /// Dropping the returned set runs each entry's `Drop`; for subscriptions
    /// that unsubscribes them.
    #[must_use = "dropping the previous upstream unsubscribes any subscriptions in it"]
    pub fn set_upstream(&self, upstream: Vec<Box<dyn Disposable>>) -> Vec<Box<dyn Disposable>> {
        mem::replace(&mut self.inner.borrow_mut().upstream, upstream)
    }

    /// Registers `observer` and returns the handle that removes it.
    ///
    /// The same observer may be registered more than once; each subscription
    /// removes one registration.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        let mut inner = self.inner.borrow_mut();
        Rc::make_mut(&mut inner.observers).push(Rc::clone(&observer));
        trace!(observers = inner.observers.len(), "observer subscribed");
        Subscription {
            owner: Rc::downgrade(&self.inner),
            observer: Some(observer),
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Returns `true` if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().observers.is_empty()
    }

    fn snapshot(&self) -> Observers<T> {
        Rc::clone(&self.inner.borrow().observers)
    }
}

impl<T: 'static> ObserverList<T> {
    /// Feeds this list from `source`.
    ///
    /// The link holds this list weakly and is appended to its upstream, so it
    /// is released when this list loses its last observer or is dropped.
    pub fn subscribe_to(&self, source: &ObserverList<T>) {
        let link = source.subscribe(Rc::new(Link {
            target: Rc::downgrade(&self.inner),
        }));
        self.inner.borrow_mut().upstream.push(Box::new(link));
    }
}

/// Forwards to a downstream list without keeping it alive.
struct Link<T> {
    target: Weak<RefCell<Inner<T>>>,
}

impl<T> Link<T> {
    fn target(&self) -> Option<ObserverList<T>> {
        self.target.upgrade().map(|inner| ObserverList { inner })
    }
}

impl<T> Observer<T> for Link<T> {
    fn on_next(&self, value: &T) {
        if let Some(list) = self.target() {
            list.on_next(value);
        }
    }

    fn on_completed(&self) {
        if let Some(list) = self.target() {
            list.on_completed();
        }
    }

    fn on_error(&self, error: &dyn Error) {
        if let Some(list) = self.target() {
            list.on_error(error);
        }
    }
}

impl<T> Observer<T> for ObserverList<T> {
    fn on_next(&self, value: &T) {
        for observer in self.snapshot().iter() {
            observer.on_next(value);
        }
    }

    fn on_completed(&self) {
        for observer in self.snapshot().iter() {
            observer.on_completed();
        }
    }

    fn on_error(&self, error: &dyn Error) {
        for observer in self.snapshot().iter() {
            observer.on_error(error);
        }
    }
}

impl<T> Clone for ObserverList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObserverList")
            .field("observers", &inner.observers.len())
            .field("upstream", &inner.upstream.len())
            .finish()
    }
}

/// Removes the first registration of `observer`. Disposes the upstream when
/// the list becomes empty.
///
/// # Panics
///
/// Panics if `observer` is not registered; a live subscription always is.
fn unsubscribe<T>(cell: &RefCell<Inner<T>>, observer: &Rc<dyn Observer<T>>) {
    let upstream = {
        let mut inner = cell.borrow_mut();
        let observers = Rc::make_mut(&mut inner.observers);
        let Some(index) = observers
            .iter()
            .position(|o| ptr::addr_eq(Rc::as_ptr(o), Rc::as_ptr(observer)))
        else {
            panic!("unexpected error: subscribed observer missing from its list");
        };
        observers.remove(index);
        trace!(observers = observers.len(), "observer unsubscribed");

        if observers.is_empty() {
            mem::take(&mut inner.upstream)
        } else {
            Vec::new()
        }
    };

    // Released borrow first: upstream disposal may re-enter this list.
    if !upstream.is_empty() {
        trace!(upstream = upstream.len(), "last observer left, disposing upstream");
        for mut disposable in upstream {
            disposable.dispose();
        }
    }
}

/// Registration of one observer on an [`ObserverList`].
///
/// Disposing (or dropping) removes it exactly once. Disposal after the list is
/// gone does nothing.
pub struct Subscription<T> {
    owner: Weak<RefCell<Inner<T>>>,
    observer: Option<Rc<dyn Observer<T>>>,
}

impl<T> Subscription<T> {
    /// Unregisters the observer. Idempotent.
    pub fn dispose(&mut self) {
        let Some(observer) = self.observer.take() else {
            return;
        };
        if let Some(owner) = self.owner.upgrade() {
            unsubscribe(&owner, &observer);
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.observer.is_none()
    }
}

impl<T> Disposable for Subscription<T> {
    fn dispose(&mut self) {
        Subscription::dispose(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
