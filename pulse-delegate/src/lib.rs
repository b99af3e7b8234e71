//! Multicast delegates over function-pointer callbacks.
//!
//! A delegate holds an ordered invocation list of [`Callback`]s (function
//! pointer plus context pointer) in one immutable, reference-counted block.
//! Adding or removing a callback builds a new block and swaps it in; an
//! invocation iterates whatever block was current when it started.
//!
//! Two flavours share the block format:
//!
//! | Type | Mutation | Synchronization |
//! |------|----------|-----------------|
//! | [`MulticastDelegate`] | `&self`, any thread | CAS on the published block, split reference count |
//! | [`FastMulticastDelegate`] | `&mut self` | none; exclusivity checked by the borrow checker |
//!
//! Callbacks are compared by identity (function and context address), never
//! structurally. Keep the [`Callback`] you registered to remove it later.
//!
//! # Multi-argument callbacks
//!
//! A callback takes a single `&A`. Callbacks over several values use a
//! tuple: `Callback<(Vec2, f32)>`.
//!
//! # Failure
//!
//! Allocation failure aborts through [`std::alloc::handle_alloc_error`].
//! Contention is retried with `crossbeam_utils::Backoff` and never
//! surfaces to the caller.

#![warn(missing_docs)]

mod block;
mod callback;
mod fast;
mod multicast;

pub use callback::Callback;
pub use fast::FastMulticastDelegate;
pub use multicast::{MulticastDelegate, Snapshot};
