//! Event plumbing built on [`pulse_delegate`].
//!
//! Two shapes of event are provided:
//!
//! | Type | Threading | Payload |
//! |------|-----------|---------|
//! | [`EventHandler`] | `Send + Sync`, lock-free | plain [`Callback`]s |
//! | [`ObserverList`] | single thread | `Rc<dyn Observer<T>>` |
//!
//! Both hand out subscriptions that remove exactly one registration when
//! disposed or dropped. Subscriptions implement [`Disposable`], so they can be
//! handed to an [`ObserverList`] as upstream; when the list loses its last
//! observer it disposes them, which in turn may empty the list above it.
//! [`ObserverList::subscribe_to`] chains two lists this way, holding the
//! downstream list weakly.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use pulse_event::{Observer, ObserverList, observer_fn};
//!
//! let source = ObserverList::<u32>::new();
//! let mapped = ObserverList::<u32>::new();
//! mapped.subscribe_to(&source);
//!
//! let seen = Rc::new(Cell::new(0));
//! let s = Rc::clone(&seen);
//! let sub = mapped.subscribe(Rc::new(observer_fn(move |v: &u32| s.set(*v))));
//!
//! source.on_next(&5);
//! assert_eq!(seen.get(), 5);
//!
//! drop(sub);
//! assert!(source.is_empty());
//! ```

#![warn(missing_docs)]

mod disposable;
mod handler;
mod observer;

pub use disposable::{DisposeFn, Disposable, dispose_fn};
pub use handler::{EventHandler, EventSubscription};
pub use observer::{FnObserver, Observer, ObserverList, Subscription, observer_fn};
pub use pulse_delegate::Callback;
