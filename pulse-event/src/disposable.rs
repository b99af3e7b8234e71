//! Explicit teardown capability.

/// Something that releases a registration or resource when disposed.
///
/// Implementations must make `dispose` idempotent: the second and later
/// calls do nothing.
pub trait Disposable {
    /// Releases whatever this value holds.
    fn dispose(&mut self);
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

/// Adapter running a closure once on first disposal. See [`dispose_fn`].
pub struct DisposeFn<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Disposable for DisposeFn<F> {
    fn dispose(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Wraps `f` into a [`Disposable`] that calls it on the first `dispose`.
pub fn dispose_fn<F: FnOnce()>(f: F) -> DisposeFn<F> {
    DisposeFn(Some(f))
}
