//! Conversion of raw symbol addresses into typed, callable hooks.
//!
//! This is the only place where an address handed back by the platform
//! loader is reinterpreted as a function. Nothing can check across this
//! boundary that the code at an address really has the signature it is
//! given: that is a contract between the plugin author and the hook catalog,
//! and it is asserted once, when a [`HookDef`] is declared.
//!
//! [`HookDef`]: crate::catalog::HookDef

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

/// The non-null address of a symbol exported by a loaded library.
///
/// A `RawSymbol` is inert: it is never dereferenced directly, only turned
/// into a function pointer through [`wrap`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSymbol(NonNull<c_void>);

// SAFETY: a `RawSymbol` is just an address. It carries no access to the data
// behind it, so moving or sharing it between threads is harmless.
unsafe impl Send for RawSymbol {}
// SAFETY: see above.
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    /// Wraps an address, returning `None` for null.
    #[must_use]
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Takes the address of an in-process function.
    ///
    /// Useful for registering statically linked hook implementations next to
    /// the ones loaded from shared libraries.
    #[must_use]
    pub fn from_fn<F: HookFn>(func: F) -> Self {
        func.into_raw()
    }

    /// Returns the address as a pointer.
    #[must_use]
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Returns the numeric value of the address.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for RawSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSymbol({:#x})", self.addr())
    }
}

/// A C-callable function pointer type usable as a hook signature.
///
/// Implemented for `extern "C" fn` and `unsafe extern "C" fn` pointers taking
/// up to eight arguments.
///
/// # Safety
///
/// Implementors must be function pointer types, exactly the size of a data
/// pointer.
pub unsafe trait HookFn: Copy + 'static {
    /// Reinterprets `symbol` as a function of this type.
    ///
    /// # Safety
    ///
    /// `symbol` must be the address of a function with exactly this signature
    /// and calling convention, and that function must stay loaded for as long
    /// as the returned pointer is used.
    unsafe fn from_raw(symbol: RawSymbol) -> Self;

    /// Returns the address of the function.
    fn into_raw(self) -> RawSymbol;
}

/// Converts a resolved address into a function pointer of signature `F`.
///
/// This is a pure reinterpretation. No validation happens beyond the
/// non-nullness `RawSymbol` already guarantees.
///
/// # Safety
///
/// See [`HookFn::from_raw`].
#[must_use]
pub unsafe fn wrap<F: HookFn>(symbol: RawSymbol) -> F {
    unsafe { F::from_raw(symbol) }
}

/// A hook implementation resolved from a loaded library.
///
/// The `'lib` lifetime ties the hook to the [`HookCaller`] (or registry) it
/// was obtained from, so it cannot be invoked after the library that
/// provides it has been unloaded. Use [`Hook::call`] to invoke it.
///
/// [`HookCaller`]: crate::caller::HookCaller
#[derive(Clone, Copy)]
pub struct Hook<'lib, F> {
    func: F,
    plugin_id: &'lib str,
}

impl<'lib, F: HookFn> Hook<'lib, F> {
    pub(crate) fn new(func: F, plugin_id: &'lib str) -> Self {
        Self { func, plugin_id }
    }

    /// Id of the plugin that provided this implementation.
    #[must_use]
    pub fn plugin_id(&self) -> &'lib str {
        self.plugin_id
    }

    /// Address of the implementation.
    #[must_use]
    pub fn symbol(&self) -> RawSymbol {
        self.func.into_raw()
    }

    /// Returns the bare function pointer, detached from the library lifetime.
    ///
    /// # Safety
    ///
    /// The pointer must not be called after the [`HookCaller`] this hook was
    /// obtained from has been dropped or closed.
    ///
    /// [`HookCaller`]: crate::caller::HookCaller
    #[must_use]
    pub unsafe fn as_fn(&self) -> F {
        self.func
    }
}

impl<F: HookFn> fmt::Debug for Hook<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("plugin_id", &self.plugin_id)
            .field("symbol", &self.symbol())
            .finish()
    }
}

macro_rules! impl_hook_fn {
    ($($arg:ident: $ty:ident),*) => {
        // SAFETY: function pointers are pointer sized.
        unsafe impl<R: 'static, $($ty: 'static),*> HookFn for unsafe extern "C" fn($($ty),*) -> R {
            unsafe fn from_raw(symbol: RawSymbol) -> Self {
                unsafe { mem::transmute_copy::<*mut c_void, Self>(&symbol.as_ptr()) }
            }

            fn into_raw(self) -> RawSymbol {
                // SAFETY: function pointers are never null.
                RawSymbol(unsafe { NonNull::new_unchecked(self as *const () as *mut c_void) })
            }
        }

        // SAFETY: function pointers are pointer sized.
        unsafe impl<R: 'static, $($ty: 'static),*> HookFn for extern "C" fn($($ty),*) -> R {
            unsafe fn from_raw(symbol: RawSymbol) -> Self {
                unsafe { mem::transmute_copy::<*mut c_void, Self>(&symbol.as_ptr()) }
            }

            fn into_raw(self) -> RawSymbol {
                // SAFETY: function pointers are never null.
                RawSymbol(unsafe { NonNull::new_unchecked(self as *const () as *mut c_void) })
            }
        }

        impl<R: 'static, $($ty: 'static),*> Hook<'_, unsafe extern "C" fn($($ty),*) -> R> {
            /// Calls the implementation and returns its result unmodified.
            ///
            /// Thread-safety of the implementation is the plugin's
            /// responsibility.
            #[allow(clippy::too_many_arguments)]
            pub fn call(&self, $($arg: $ty),*) -> R {
                // SAFETY: the signature was asserted when the hook definition
                // was declared, and the borrow on the caller keeps the library
                // loaded.
                unsafe { (self.func)($($arg),*) }
            }
        }

        impl<R: 'static, $($ty: 'static),*> Hook<'_, extern "C" fn($($ty),*) -> R> {
            /// Calls the implementation and returns its result unmodified.
            #[allow(clippy::too_many_arguments)]
            pub fn call(&self, $($arg: $ty),*) -> R {
                (self.func)($($arg),*)
            }
        }
    };
}

impl_hook_fn!();
impl_hook_fn!(a: A);
impl_hook_fn!(a: A, b: B);
impl_hook_fn!(a: A, b: B, c: C);
impl_hook_fn!(a: A, b: B, c: C, d: D);
impl_hook_fn!(a: A, b: B, c: C, d: D, e: E);
impl_hook_fn!(a: A, b: B, c: C, d: D, e: E, f: G);
impl_hook_fn!(a: A, b: B, c: C, d: D, e: E, f: G, g: H);
impl_hook_fn!(a: A, b: B, c: C, d: D, e: E, f: G, g: H, h: I);

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_int;

    extern "C" fn add(a: c_int, b: c_int) -> c_int {
        a + b
    }

    unsafe extern "C" fn scale(v: f64, factor: f64) -> f64 {
        v * factor
    }

    #[test]
    fn null_is_not_a_symbol() {
        assert!(RawSymbol::new(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn wrapped_address_calls_the_function() {
        let symbol = RawSymbol::from_fn(add as extern "C" fn(c_int, c_int) -> c_int);
        let func: unsafe extern "C" fn(c_int, c_int) -> c_int = unsafe { wrap(symbol) };

        assert_eq!(unsafe { func(1, 2) }, 3);
    }

    #[test]
    fn hook_call_forwards_arguments() {
        let func = scale as unsafe extern "C" fn(f64, f64) -> f64;
        let hook = Hook::new(func, "local");

        assert!((hook.call(1.5, 4.0) - 6.0).abs() < f64::EPSILON);
        assert_eq!(hook.plugin_id(), "local");
        assert_eq!(hook.symbol(), RawSymbol::from_fn(func));
    }

    #[test]
    fn debug_shows_hex_address() {
        let symbol = RawSymbol::from_fn(add as extern "C" fn(c_int, c_int) -> c_int);

        assert!(format!("{symbol:?}").starts_with("RawSymbol(0x"));
    }
}
