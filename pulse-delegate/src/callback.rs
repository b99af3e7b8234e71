//! Function pointer plus context pointer, invoked without allocation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;

type Thunk<A> = unsafe fn(*const (), *const (), &A);

/// A registered callback: a function pointer and an optional context pointer.
///
/// Two callbacks are equal when both their function and context addresses
/// are equal. This is pointer identity, not structural equality: the same
/// function paired with two distinct contexts yields two distinct callbacks.
/// Distinct functions are not guaranteed distinct addresses: the compiler may
/// merge two functions whose bodies compile to the same code, and those then
/// compare equal. Give each registration its own context when identity
/// matters, and pass back the `Callback` returned at registration time to
/// remove it.
pub struct Callback<A: ?Sized> {
    thunk: Thunk<A>,
    func: *const (),
    data: *const (),
    _marker: PhantomData<fn(&A)>,
}

// SAFETY: `from_fn` carries no context; `with_context` requires `C: Sync`
// with a `'static` borrow; `from_raw` makes thread safety of the context the
// caller's obligation.
unsafe impl<A: ?Sized> Send for Callback<A> {}
unsafe impl<A: ?Sized> Sync for Callback<A> {}

impl<A: ?Sized> Callback<A> {
    /// Wraps a plain function. Non-capturing closures coerce.
    ///
    /// ```
    /// use pulse_delegate::Callback;
    ///
    /// let cb = Callback::from_fn(|v: &u32| assert_eq!(*v, 7));
    /// cb.invoke(&7);
    /// ```
    pub fn from_fn(f: fn(&A)) -> Self {
        Self {
            thunk: call_plain::<A>,
            func: f as *const (),
            data: std::ptr::null(),
            _marker: PhantomData,
        }
    }

    /// Pairs a function with a shared, `'static` context.
    pub fn with_context<C: Sync + 'static>(f: fn(&A, &C), context: &'static C) -> Self {
        Self {
            thunk: call_with_context::<A, C>,
            func: f as *const (),
            data: (context as *const C).cast(),
            _marker: PhantomData,
        }
    }

    /// Pairs a function with an untyped context pointer.
    ///
    /// # Safety
    ///
    /// `data` must stay valid for as long as the callback can be invoked,
    /// from every thread that can invoke it, and `f` must accept it.
    pub unsafe fn from_raw(f: unsafe fn(&A, *const ()), data: *const ()) -> Self {
        Self {
            thunk: call_raw::<A>,
            func: f as *const (),
            data,
            _marker: PhantomData,
        }
    }

    /// Calls the function with its context and `arg`.
    #[inline]
    pub fn invoke(&self, arg: &A) {
        // SAFETY: `thunk` was chosen at construction to match `func`'s real
        // signature, and every constructor upholds the context's validity.
        unsafe { (self.thunk)(self.func, self.data, arg) }
    }

    /// Address of the function.
    #[inline]
    pub fn function_ptr(&self) -> *const () {
        self.func
    }

    /// Address of the context, null for [`from_fn`](Callback::from_fn).
    #[inline]
    pub fn context_ptr(&self) -> *const () {
        self.data
    }
}

unsafe fn call_plain<A: ?Sized>(func: *const (), _data: *const (), arg: &A) {
    // SAFETY: produced from a `fn(&A)` in `from_fn`.
    let f = unsafe { mem::transmute::<*const (), fn(&A)>(func) };
    f(arg)
}

unsafe fn call_with_context<A: ?Sized, C>(func: *const (), data: *const (), arg: &A) {
    // SAFETY: produced from a `fn(&A, &C)` and a `&'static C` in `with_context`.
    let f = unsafe { mem::transmute::<*const (), fn(&A, &C)>(func) };
    let context = unsafe { &*data.cast::<C>() };
    f(arg, context)
}

unsafe fn call_raw<A: ?Sized>(func: *const (), data: *const (), arg: &A) {
    // SAFETY: produced from an `unsafe fn(&A, *const ())` in `from_raw`,
    // whose caller vouched for `data`.
    unsafe {
        let f = mem::transmute::<*const (), unsafe fn(&A, *const ())>(func);
        f(arg, data)
    }
}

impl<A: ?Sized> Clone for Callback<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: ?Sized> Copy for Callback<A> {}

impl<A: ?Sized> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.func == other.func && self.data == other.data
    }
}

impl<A: ?Sized> Eq for Callback<A> {}

impl<A: ?Sized> Hash for Callback<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.func.hash(state);
        self.data.hash(state);
    }
}

impl<A: ?Sized> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("func", &self.func)
            .field("data", &self.data)
            .finish()
    }
}
