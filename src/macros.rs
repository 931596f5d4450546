//! Macros for declaring hook catalogs.

/// Declares a hook catalog as a module.
///
/// The generated module contains a `catalog()` function returning the
/// [`HookCatalog`] and one [`HookDef`] constant per hook, named after the
/// hook, typed with the hook's signature as an `unsafe extern "C" fn`.
/// Documentation written on a hook is kept on its constant.
///
/// Hooks are declared inside an `unsafe extern "C"` block. Writing it is the
/// host's assertion that every plugin exports each hook with exactly that C
/// signature, which cannot be checked at runtime.
///
/// # Example
///
/// ```
/// use std::ffi::c_int;
///
/// hookman::hook_catalog! {
///     /// Hooks of the ACME simulator.
///     pub mod acme {
///         project = "acme";
///         version = "1";
///
///         unsafe extern "C" {
///             /// Docs for Friction Factor
///             fn friction_factor(v1: c_int, v2: c_int) -> c_int;
///             /// Docs for Environment Temperature
///             fn env_temperature(v3: f64, v4: f64) -> f64;
///         }
///     }
/// }
///
/// # fn main() {
/// let catalog = acme::catalog();
/// assert_eq!(catalog.hooks(), ["friction_factor", "env_temperature"]);
/// assert_eq!(acme::friction_factor.name(), "friction_factor");
/// # }
/// ```
///
/// [`HookCatalog`]: crate::catalog::HookCatalog
/// [`HookDef`]: crate::catalog::HookDef
#[macro_export]
macro_rules! hook_catalog {
    (
        $(#[$meta:meta])*
        $vis:vis mod $module:ident {
            project = $project:literal;
            version = $version:literal;

            unsafe extern "C" {
                $(
                    $(#[$hook_meta:meta])*
                    fn $hook:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
                )+
            }
        }
    ) => {
        $(#[$meta])*
        #[allow(non_upper_case_globals)]
        $vis mod $module {
            #[allow(unused_imports)]
            use super::*;

            /// Returns the hook catalog.
            #[must_use]
            pub fn catalog() -> $crate::catalog::HookCatalog {
                $crate::catalog::HookCatalog::new($project, $version, [$(stringify!($hook)),+])
            }

            $(
                $(#[$hook_meta])*
                pub const $hook: $crate::catalog::HookDef<
                    unsafe extern "C" fn($($ty),*) $(-> $ret)?
                > = unsafe { $crate::catalog::HookDef::new($project, $version, stringify!($hook)) };
            )+
        }
    };
}

#[cfg(test)]
mod tests {
    use std::ffi::c_int;

    crate::hook_catalog! {
        mod acme {
            project = "ACME";
            version = "1";

            unsafe extern "C" {
                fn friction_factor(v1: c_int, v2: c_int) -> c_int;
                fn friction_factor_2(v1: c_int, v2: c_int) -> c_int;
                /// Returns nothing.
                fn notify(code: c_int);
            }
        }
    }

    #[test]
    fn catalog_lists_hooks_in_declaration_order() {
        let catalog = acme::catalog();

        assert_eq!(catalog.project(), "ACME");
        assert_eq!(
            catalog.hooks(),
            ["friction_factor", "friction_factor_2", "notify"]
        );
        assert_eq!(
            catalog.full_hook_name(acme::friction_factor_2.name()),
            "acme_v1_friction_factor_2"
        );
    }

    #[test]
    fn definitions_carry_their_catalog() {
        let catalog = acme::catalog();

        assert_eq!(acme::notify.project(), "ACME");
        assert_eq!(acme::notify.version(), "1");
        assert!(catalog.owns(&acme::notify));
        assert!(catalog.owns(&acme::friction_factor_2));
    }

    #[test]
    fn definitions_carry_signatures() {
        let _: crate::catalog::HookDef<unsafe extern "C" fn(c_int)> = acme::notify;
        let _: crate::catalog::HookDef<unsafe extern "C" fn(c_int, c_int) -> c_int> =
            acme::friction_factor;
    }
}
