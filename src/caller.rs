//! The [`HookCaller`]: loads plugin libraries and hands out their hooks.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fmt;
use std::mem;
use std::path::Path;

use tracing::{debug, warn};

use crate::catalog::{HookCatalog, HookDef, PLUGIN_ID_SYMBOL, call_marker};
use crate::error::Result;
use crate::flags::LoadFlags;
use crate::loader::LoadedLibrary;
use crate::registry::HookRegistry;
use crate::symbol::{Hook, HookFn, RawSymbol};

/// A plugin library owned by a [`HookCaller`].
pub struct LoadedPlugin {
    plugin_id: String,
    hooks: Vec<String>,
    version_api: Option<RawSymbol>,
    library: LoadedLibrary,
}

impl LoadedPlugin {
    /// Id under which the plugin's hooks were registered.
    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.library.path()
    }

    /// Catalog hooks this library implements, in catalog order.
    #[must_use]
    pub fn hooks(&self) -> &[String] {
        &self.hooks
    }

    /// Whether the library implements `hook`.
    #[must_use]
    pub fn implements(&self, hook: &str) -> bool {
        self.hooks.iter().any(|h| h == hook)
    }

    /// The catalog version the plugin reports through its
    /// `<project>_version_api` export, if it has one.
    ///
    /// No compatibility check is made here; comparing the value against the
    /// host's catalog is up to the caller.
    #[must_use]
    pub fn version_api(&self) -> Option<String> {
        self.version_api.and_then(call_marker)
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("plugin_id", &self.plugin_id)
            .field("path", &self.library.path())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Plugin id inferred from a library file name, `libacme.so` becoming `acme`.
fn plugin_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_prefix(DLL_PREFIX).unwrap_or(&name);
    let name = name.strip_suffix(DLL_SUFFIX).unwrap_or(name);
    name.to_owned()
}

/// Loads plugin libraries against a [`HookCatalog`] and exposes the hooks
/// they implement.
///
/// Every library is loaded once and unloaded once, when the caller is
/// dropped (or [closed](Self::close)). Hooks borrow the caller, so none can
/// be invoked after its library is gone.
///
/// ```no_run
/// use std::ffi::c_int;
///
/// hookman::hook_catalog! {
///     mod acme {
///         project = "acme";
///         version = "1";
///
///         unsafe extern "C" {
///             /// Friction factor of a pipe section.
///             fn friction_factor(v1: c_int, v2: c_int) -> c_int;
///         }
///     }
/// }
///
/// # fn main() -> hookman::Result<()> {
/// let mut caller = hookman::HookCaller::new(acme::catalog())?;
/// caller.load_from_library("plugins/libacme_simple.so")?;
///
/// let friction_factor = caller.single(&acme::friction_factor)?;
/// assert_eq!(friction_factor.call(1, 2), 3);
/// # Ok(())
/// # }
/// ```
pub struct HookCaller {
    // Declared before `plugins`: the hooks must go before the libraries.
    registry: HookRegistry,
    plugins: Vec<LoadedPlugin>,
    flags: LoadFlags,
}

impl HookCaller {
    /// Creates a caller with nothing loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if the catalog does not validate.
    ///
    /// [`Error::InvalidCatalog`]: crate::Error::InvalidCatalog
    pub fn new(catalog: HookCatalog) -> Result<Self> {
        catalog.validate()?;
        Ok(Self {
            registry: HookRegistry::new(catalog),
            plugins: Vec::new(),
            flags: LoadFlags::default(),
        })
    }

    /// Sets the flags used for libraries loaded from now on.
    #[must_use]
    pub fn with_flags(mut self, flags: LoadFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Loads a plugin library and registers every catalog hook it exports.
    ///
    /// The plugin id is taken from the library's `get_plugin_id` export when
    /// present, otherwise from its file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryLoad`] (or [`Error::PathEncoding`]) if the
    /// library cannot be opened. Nothing is registered in that case.
    ///
    /// [`Error::LibraryLoad`]: crate::Error::LibraryLoad
    /// [`Error::PathEncoding`]: crate::Error::PathEncoding
    pub fn load_from_library(&mut self, path: impl AsRef<Path>) -> Result<&LoadedPlugin> {
        let path = path.as_ref();
        let library = LoadedLibrary::load_with_flags(path, self.flags)?;
        let plugin_id = library
            .resolve(PLUGIN_ID_SYMBOL)
            .and_then(call_marker)
            .unwrap_or_else(|| plugin_id_from_path(path));
        Ok(self.register(library, plugin_id))
    }

    /// Like [`load_from_library`](Self::load_from_library), registering the
    /// hooks under an explicit plugin id.
    ///
    /// # Errors
    ///
    /// See [`load_from_library`](Self::load_from_library).
    pub fn load_from_library_as(
        &mut self,
        path: impl AsRef<Path>,
        plugin_id: &str,
    ) -> Result<&LoadedPlugin> {
        let library = LoadedLibrary::load_with_flags(path, self.flags)?;
        Ok(self.register(library, plugin_id.to_owned()))
    }

    fn register(&mut self, library: LoadedLibrary, plugin_id: String) -> &LoadedPlugin {
        let catalog = self.registry.catalog();
        let resolved: Vec<(String, String, RawSymbol)> = catalog
            .symbols()
            .filter_map(|(hook, symbol_name)| {
                let symbol = library.resolve(&symbol_name)?;
                Some((hook.to_owned(), symbol_name, symbol))
            })
            .collect();
        let version_api = library.resolve(&catalog.version_api_symbol());

        let mut hooks = Vec::with_capacity(resolved.len());
        for (hook, symbol_name, symbol) in resolved {
            // SAFETY: the library is moved into `self.plugins` below and only
            // unloaded after the registry has been cleared. Signatures are
            // the catalog's contract.
            unsafe { self.registry.append(&hook, &plugin_id, symbol) };
            debug!(hook = %hook, symbol = %symbol_name, plugin_id = %plugin_id, "registered hook");
            hooks.push(hook);
        }

        debug!(
            plugin_id = %plugin_id,
            path = %library.path().display(),
            implemented = hooks.len(),
            "plugin loaded"
        );

        self.plugins.push(LoadedPlugin {
            plugin_id,
            hooks,
            version_api,
            library,
        });
        &self.plugins[self.plugins.len() - 1]
    }

    /// Registers an implementation living in the host process, next to the
    /// ones loaded from libraries.
    ///
    /// The implementation takes its place in load order: libraries loaded
    /// afterwards come after it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignHook`] if `hook` was declared for another
    /// catalog.
    ///
    /// [`Error::ForeignHook`]: crate::Error::ForeignHook
    pub fn append_impl<F: HookFn>(&mut self, hook: &HookDef<F>, plugin_id: &str, func: F) -> Result<()> {
        self.registry.append_impl(hook, plugin_id, func)?;
        debug!(hook = hook.name(), plugin_id, "registered in-process hook");
        Ok(())
    }

    /// Every implementation of `hook`, in load order. Empty for a hook of
    /// another catalog.
    #[must_use]
    pub fn get_hook_implementations<F: HookFn>(&self, hook: &HookDef<F>) -> Vec<Hook<'_, F>> {
        self.registry.get(hook)
    }

    /// The single implementation of `hook`; the first loaded wins when there
    /// are several.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HookNotRegistered`] if no loaded library implements
    /// the hook, or [`Error::ForeignHook`] for a hook of another catalog.
    ///
    /// [`Error::HookNotRegistered`]: crate::Error::HookNotRegistered
    /// [`Error::ForeignHook`]: crate::Error::ForeignHook
    pub fn single<F: HookFn>(&self, hook: &HookDef<F>) -> Result<Hook<'_, F>> {
        self.registry.single(hook)
    }

    /// The implementation of `hook` provided by the plugin `plugin_id`.
    #[must_use]
    pub fn for_plugin<F: HookFn>(&self, hook: &HookDef<F>, plugin_id: &str) -> Option<Hook<'_, F>> {
        self.registry.for_plugin(hook, plugin_id)
    }

    /// The registry backing this caller.
    #[must_use]
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Loaded plugins, in load order.
    #[must_use]
    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.plugins
    }

    /// The catalog hooks are resolved against.
    #[must_use]
    pub fn catalog(&self) -> &HookCatalog {
        self.registry.catalog()
    }

    /// Unloads every library, returning the first [`Error::LibraryUnload`]
    /// reported by the platform loader. All libraries are released even if
    /// one fails.
    ///
    /// [`Error::LibraryUnload`]: crate::Error::LibraryUnload
    ///
    /// Dropping the caller does the same but can only log failures.
    ///
    /// # Errors
    ///
    /// Returns the first unload error.
    pub fn close(mut self) -> Result<()> {
        let mut first_error = None;
        for result in self.release() {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn release(&mut self) -> Vec<Result<()>> {
        self.registry.clear();
        mem::take(&mut self.plugins)
            .into_iter()
            .map(|plugin| plugin.library.unload())
            .collect()
    }
}

impl Drop for HookCaller {
    fn drop(&mut self) {
        for result in self.release() {
            if let Err(e) = result {
                warn!(error = %e, "failed to unload plugin library");
            }
        }
    }
}

impl fmt::Debug for HookCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookCaller")
            .field("catalog", self.registry.catalog())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
