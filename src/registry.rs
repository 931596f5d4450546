//! The table of hook implementations contributed by loaded plugins.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{HookCatalog, HookDef};
use crate::error::{Error, Result};
use crate::symbol::{Hook, HookFn, RawSymbol, wrap};

/// One registered implementation of a hook.
#[derive(Debug, Clone)]
pub struct HookEntry {
    symbol: RawSymbol,
    plugin_id: Arc<str>,
}

impl HookEntry {
    /// Address of the implementation.
    #[must_use]
    pub fn symbol(&self) -> RawSymbol {
        self.symbol
    }

    /// Id of the plugin that contributed the implementation.
    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

/// Maps hook names to the implementations registered for them.
///
/// Each hook holds an append-only sequence: implementations are returned in
/// the order they were registered, which is the order plugins were loaded.
/// A hook nobody implements simply has an empty sequence.
///
/// A registry belongs to one [`HookCatalog`]. Typed lookups with a
/// [`HookDef`] declared for another catalog find nothing.
#[derive(Debug)]
pub struct HookRegistry {
    catalog: HookCatalog,
    entries: HashMap<String, Vec<HookEntry>>,
}

impl HookRegistry {
    /// Creates an empty registry for the hooks of `catalog`.
    #[must_use]
    pub fn new(catalog: HookCatalog) -> Self {
        Self {
            catalog,
            entries: HashMap::new(),
        }
    }

    /// The catalog this registry holds implementations for.
    #[must_use]
    pub fn catalog(&self) -> &HookCatalog {
        &self.catalog
    }

    /// Appends an implementation of `hook_name`.
    ///
    /// # Safety
    ///
    /// `symbol` must remain valid, i.e. the library exporting it must stay
    /// loaded, for as long as this registry exists, and it must match the
    /// signature the registry's catalog declares for `hook_name`.
    pub unsafe fn append(&mut self, hook_name: &str, plugin_id: &str, symbol: RawSymbol) {
        self.entries
            .entry(hook_name.to_owned())
            .or_default()
            .push(HookEntry {
                symbol,
                plugin_id: Arc::from(plugin_id),
            });
    }

    /// Appends an in-process implementation of `hook`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignHook`] if `hook` was declared for another
    /// catalog.
    pub fn append_impl<F: HookFn>(&mut self, hook: &HookDef<F>, plugin_id: &str, func: F) -> Result<()> {
        self.catalog.check_owns(hook)?;
        // SAFETY: `func` is a function of this process with the signature the
        // catalog declares for `hook`; it never gets unloaded.
        unsafe { self.append(hook.name(), plugin_id, RawSymbol::from_fn(func)) };
        Ok(())
    }

    /// Untyped view of the implementations of `hook_name`, in registration
    /// order.
    #[must_use]
    pub fn entries(&self, hook_name: &str) -> &[HookEntry] {
        self.entries.get(hook_name).map_or(&[], Vec::as_slice)
    }

    /// Every implementation of `hook`, in registration order. Empty if no
    /// plugin implements it or if `hook` belongs to another catalog.
    #[must_use]
    pub fn get<F: HookFn>(&self, hook: &HookDef<F>) -> Vec<Hook<'_, F>> {
        self.typed_entries(hook)
            .iter()
            .map(Self::typed)
            .collect()
    }

    /// The implementation of a hook expected to have exactly one.
    ///
    /// When several plugins implement the hook, the first one registered
    /// wins; later registrations are still reachable through [`get`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::HookNotRegistered`] if no plugin implements it, or
    /// [`Error::ForeignHook`] if `hook` was declared for another catalog.
    ///
    /// [`get`]: Self::get
    pub fn single<F: HookFn>(&self, hook: &HookDef<F>) -> Result<Hook<'_, F>> {
        self.catalog.check_owns(hook)?;
        self.entries(hook.name())
            .first()
            .map(Self::typed)
            .ok_or_else(|| Error::HookNotRegistered {
                hook: hook.name().to_owned(),
            })
    }

    /// The implementation contributed by the plugin `plugin_id`, if any.
    ///
    /// If the same plugin id was registered more than once, the most recent
    /// registration is returned.
    #[must_use]
    pub fn for_plugin<F: HookFn>(&self, hook: &HookDef<F>, plugin_id: &str) -> Option<Hook<'_, F>> {
        self.typed_entries(hook)
            .iter()
            .rev()
            .find(|entry| entry.plugin_id() == plugin_id)
            .map(Self::typed)
    }

    /// Names of the hooks with at least one implementation.
    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Total number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    fn typed_entries<F: HookFn>(&self, hook: &HookDef<F>) -> &[HookEntry] {
        if self.catalog.owns(hook) {
            self.entries(hook.name())
        } else {
            &[]
        }
    }

    fn typed<F: HookFn>(entry: &HookEntry) -> Hook<'_, F> {
        // SAFETY: `append` requires the symbol to match the signature declared
        // by the catalog, and only definitions of that catalog get here.
        let func = unsafe { wrap::<F>(entry.symbol) };
        Hook::new(func, &entry.plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_int;

    type FrictionFactor = unsafe extern "C" fn(c_int, c_int) -> c_int;

    const FRICTION_FACTOR: HookDef<FrictionFactor> =
        unsafe { HookDef::new("acme", "1", "friction_factor") };
    const ENV_TEMPERATURE: HookDef<unsafe extern "C" fn(f64, f64) -> f64> =
        unsafe { HookDef::new("acme", "1", "env_temperature") };
    const OTHER_ENV_TEMPERATURE: HookDef<FrictionFactor> =
        unsafe { HookDef::new("other", "1", "env_temperature") };

    fn acme() -> HookCatalog {
        HookCatalog::new("acme", "1", ["friction_factor", "env_temperature"])
    }

    unsafe extern "C" fn sum(a: c_int, b: c_int) -> c_int {
        a + b
    }

    unsafe extern "C" fn product(a: c_int, b: c_int) -> c_int {
        a * b
    }

    fn registry_with(impls: &[(FrictionFactor, &str)]) -> HookRegistry {
        let mut registry = HookRegistry::new(acme());
        for (func, plugin_id) in impls {
            registry.append_impl(&FRICTION_FACTOR, plugin_id, *func).unwrap();
        }
        registry
    }

    unsafe extern "C" fn scale(v: f64, factor: f64) -> f64 {
        v * factor
    }

    #[test]
    fn absent_hook_is_empty_not_an_error() {
        let registry = HookRegistry::new(acme());

        assert!(registry.get(&FRICTION_FACTOR).is_empty());
        assert!(registry.entries("friction_factor").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn implementations_keep_registration_order() {
        let registry = registry_with(&[(sum as FrictionFactor, "first"), (product, "second")]);

        let impls = registry.get(&FRICTION_FACTOR);
        assert_eq!(impls.len(), 2);
        assert_eq!(impls[0].plugin_id(), "first");
        assert_eq!(impls[0].call(2, 3), 5);
        assert_eq!(impls[1].plugin_id(), "second");
        assert_eq!(impls[1].call(2, 3), 6);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn single_returns_first_registered() {
        let registry = registry_with(&[(product as FrictionFactor, "first"), (sum, "second")]);

        let hook = registry.single(&FRICTION_FACTOR).unwrap();
        assert_eq!(hook.plugin_id(), "first");
        assert_eq!(hook.call(4, 5), 20);
    }

    #[test]
    fn single_without_implementations_fails() {
        let registry = registry_with(&[(sum as FrictionFactor, "first")]);

        let err = registry.single(&ENV_TEMPERATURE).unwrap_err();
        assert!(matches!(err, Error::HookNotRegistered { hook } if hook == "env_temperature"));
    }

    #[test]
    fn for_plugin_prefers_latest_registration_of_that_id() {
        let registry = registry_with(&[
            (sum as FrictionFactor, "acme"),
            (product, "other"),
            (product, "acme"),
        ]);

        assert_eq!(registry.for_plugin(&FRICTION_FACTOR, "acme").unwrap().call(3, 3), 9);
        assert_eq!(registry.for_plugin(&FRICTION_FACTOR, "other").unwrap().call(3, 4), 12);
        assert!(registry.for_plugin(&FRICTION_FACTOR, "missing").is_none());
    }

    #[test]
    fn hook_names_lists_implemented_hooks() {
        let registry = registry_with(&[(sum as FrictionFactor, "acme")]);

        assert_eq!(registry.hook_names().collect::<Vec<_>>(), vec!["friction_factor"]);
    }

    #[test]
    fn definitions_from_another_catalog_find_nothing() {
        let mut registry = HookRegistry::new(acme());
        // SAFETY: in-process function with the signature acme declares.
        unsafe {
            registry.append(
                ENV_TEMPERATURE.name(),
                "acme",
                RawSymbol::from_fn(scale as unsafe extern "C" fn(f64, f64) -> f64),
            );
        }

        assert_eq!(registry.get(&ENV_TEMPERATURE).len(), 1);
        assert!(registry.get(&OTHER_ENV_TEMPERATURE).is_empty());
        assert!(registry.for_plugin(&OTHER_ENV_TEMPERATURE, "acme").is_none());
        assert!(matches!(
            registry.single(&OTHER_ENV_TEMPERATURE),
            Err(Error::ForeignHook { .. })
        ));
    }

    #[test]
    fn foreign_definitions_cannot_append() {
        let mut registry = HookRegistry::new(acme());

        let err = registry
            .append_impl(&OTHER_ENV_TEMPERATURE, "host", sum as FrictionFactor)
            .unwrap_err();

        assert!(matches!(err, Error::ForeignHook { ref hook, .. } if hook == "env_temperature"));
        assert!(registry.is_empty());
    }
}
