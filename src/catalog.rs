//! Hook catalogs: the names and signatures a host accepts from plugins.
//!
//! A catalog is usually declared with the [`hook_catalog!`] macro, which
//! produces both the runtime [`HookCatalog`] (used when resolving symbols)
//! and one typed [`HookDef`] per hook (used when retrieving implementations).
//!
//! Exported symbols follow the `<project>_v<version>_<hook>` convention, all
//! lowercase. A plugin may also export `<project>_version_api`, returning the
//! catalog version as a C string, and `get_plugin_id`.
//!
//! [`hook_catalog!`]: crate::hook_catalog

use std::collections::HashSet;
use std::ffi::{CStr, c_char};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::symbol::{HookFn, RawSymbol, wrap};

/// Name of the optional export returning the plugin id.
pub const PLUGIN_ID_SYMBOL: &str = "get_plugin_id";

/// Signature of the `<project>_version_api` and `get_plugin_id` exports.
type MarkerFn = unsafe extern "C" fn() -> *const c_char;

/// Calls a marker export and copies the string it returns.
///
/// The library exporting `symbol` must still be loaded.
pub(crate) fn call_marker(symbol: RawSymbol) -> Option<String> {
    // SAFETY: marker exports are part of the plugin ABI and return a static,
    // NUL-terminated string or null.
    unsafe {
        let marker: MarkerFn = wrap(symbol);
        let ptr = marker();
        if ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// The set of hooks a host application accepts, with the naming scheme used
/// to find them in plugin libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCatalog {
    project: String,
    version: String,
    hooks: Vec<String>,
}

impl HookCatalog {
    /// Creates a catalog. Hook order is the order symbols are resolved in.
    pub fn new<I, S>(project: impl Into<String>, version: impl Into<String>, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project: project.into(),
            version: version.into(),
            hooks: hooks.into_iter().map(Into::into).collect(),
        }
    }

    /// Project name used as the symbol prefix.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Catalog version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Logical hook names, in catalog order.
    #[must_use]
    pub fn hooks(&self) -> &[String] {
        &self.hooks
    }

    /// Whether `hook` is part of this catalog.
    #[must_use]
    pub fn contains(&self, hook: &str) -> bool {
        self.hooks.iter().any(|h| h == hook)
    }

    /// Whether `hook` was declared for this catalog.
    ///
    /// Project and version compare case-insensitively, as they do once
    /// folded into symbol names.
    #[must_use]
    pub fn owns<F: HookFn>(&self, hook: &HookDef<F>) -> bool {
        self.project.eq_ignore_ascii_case(hook.project())
            && self.version.eq_ignore_ascii_case(hook.version())
            && self.contains(hook.name())
    }

    /// Fails with [`Error::ForeignHook`] unless `hook` belongs to this
    /// catalog.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn check_owns<F: HookFn>(&self, hook: &HookDef<F>) -> Result<()> {
        if self.owns(hook) {
            Ok(())
        } else {
            Err(Error::ForeignHook {
                hook: hook.name().to_owned(),
                declared_for: format!("{} v{}", hook.project(), hook.version()),
                expected: format!("{} v{}", self.project, self.version),
            })
        }
    }

    /// Exported symbol name for a logical hook name.
    ///
    /// ```
    /// use hookman::catalog::HookCatalog;
    ///
    /// let catalog = HookCatalog::new("ACME", "1", ["friction_factor"]);
    /// assert_eq!(catalog.full_hook_name("friction_factor"), "acme_v1_friction_factor");
    /// ```
    #[must_use]
    pub fn full_hook_name(&self, hook: &str) -> String {
        format!("{}_v{}_{}", self.project, self.version, hook).to_lowercase()
    }

    /// Name of the optional export returning the catalog version a plugin
    /// was built against.
    #[must_use]
    pub fn version_api_symbol(&self) -> String {
        format!("{}_version_api", self.project.to_lowercase())
    }

    /// Iterates over `(hook name, exported symbol name)` pairs in catalog order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.hooks
            .iter()
            .map(|hook| (hook.as_str(), self.full_hook_name(hook)))
    }

    /// Checks that the catalog can be used to resolve symbols.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if the project name is not a valid C
    /// identifier, if there are no hooks, or if a hook name is invalid or
    /// repeated.
    pub fn validate(&self) -> Result<()> {
        if !is_c_identifier(&self.project) {
            return Err(Error::InvalidCatalog(format!(
                "project name `{}` is not a valid C identifier",
                self.project
            )));
        }
        let version_ok = !self.version.is_empty()
            && self
                .version
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if !version_ok {
            return Err(Error::InvalidCatalog(format!(
                "version `{}` cannot be part of a symbol name",
                self.version
            )));
        }
        if self.hooks.is_empty() {
            return Err(Error::InvalidCatalog("catalog has no hooks".into()));
        }

        let mut seen = HashSet::new();
        for hook in &self.hooks {
            if !is_c_identifier(hook) {
                return Err(Error::InvalidCatalog(format!(
                    "hook name `{hook}` is not a valid C identifier"
                )));
            }
            if !seen.insert(hook.to_lowercase()) {
                return Err(Error::InvalidCatalog(format!(
                    "hook `{hook}` is declared more than once"
                )));
            }
        }
        Ok(())
    }
}

fn is_c_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A typed key for one hook of a catalog.
///
/// `F` is the hook's signature as a function pointer type, for example
/// `unsafe extern "C" fn(c_int, c_int) -> c_int`. Implementations are
/// retrieved from a [`HookCaller`] with it.
///
/// A definition remembers the project and version of the catalog it was
/// declared for. Callers and registries built from another catalog never
/// hand out implementations for it.
///
/// [`HookCaller`]: crate::caller::HookCaller
pub struct HookDef<F> {
    project: &'static str,
    version: &'static str,
    name: &'static str,
    _signature: PhantomData<F>,
}

impl<F: HookFn> HookDef<F> {
    /// Declares the hook `name` of the catalog `project` version `version`.
    ///
    /// # Safety
    ///
    /// Every library loaded against that catalog must export the hook with
    /// exactly the signature and calling convention `F`, since this is
    /// assumed without any check when the hook is called.
    #[must_use]
    pub const unsafe fn new(
        project: &'static str,
        version: &'static str,
        name: &'static str,
    ) -> Self {
        Self {
            project,
            version,
            name,
            _signature: PhantomData,
        }
    }

    /// Logical hook name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Project of the catalog the hook was declared for.
    #[must_use]
    pub const fn project(&self) -> &'static str {
        self.project
    }

    /// Version of the catalog the hook was declared for.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        self.version
    }
}

impl<F> Clone for HookDef<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for HookDef<F> {}

impl<F> fmt::Debug for HookDef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDef")
            .field("project", &self.project)
            .field("version", &self.version)
            .field("name", &self.name)
            .finish()
    }
}
