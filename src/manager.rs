//! [`HookMan`]: discovers installed plugins and builds a [`HookCaller`] from
//! them.

use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::caller::HookCaller;
use crate::catalog::HookCatalog;
use crate::error::Result;
use crate::flags::LoadFlags;
use crate::plugin::{PluginInfo, find_config_files};

/// Environment variable holding extra plugin directories, in the platform's
/// `PATH` syntax.
pub const PLUGIN_PATH_ENV: &str = "HOOKMAN_PLUGIN_PATH";

/// Ties a hook catalog to the directories plugins are installed in.
#[derive(Debug, Clone)]
pub struct HookMan {
    catalog: HookCatalog,
    plugin_dirs: Vec<PathBuf>,
    ignored_sub_dirs: Vec<String>,
    flags: LoadFlags,
}

impl HookMan {
    /// Creates a manager looking for plugins in `plugin_dirs`.
    pub fn new<I, P>(catalog: HookCatalog, plugin_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            catalog,
            plugin_dirs: plugin_dirs.into_iter().map(Into::into).collect(),
            ignored_sub_dirs: Vec::new(),
            flags: LoadFlags::default(),
        }
    }

    /// Creates a manager looking for plugins in the directories listed in
    /// `HOOKMAN_PLUGIN_PATH`.
    #[must_use]
    pub fn from_env(catalog: HookCatalog) -> Self {
        let dirs: Vec<PathBuf> = env::var_os(PLUGIN_PATH_ENV)
            .map(|value| env::split_paths(&value).collect())
            .unwrap_or_default();
        Self::new(catalog, dirs)
    }

    /// Skips plugins installed under `name` in any plugin directory.
    #[must_use]
    pub fn ignore_sub_dir(mut self, name: impl Into<String>) -> Self {
        self.ignored_sub_dirs.push(name.into());
        self
    }

    /// Flags used when loading plugin libraries.
    #[must_use]
    pub fn with_flags(mut self, flags: LoadFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The catalog plugins are loaded against.
    #[must_use]
    pub fn catalog(&self) -> &HookCatalog {
        &self.catalog
    }

    /// Directories searched for plugins.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Paths of every discovered `plugin.yaml`.
    #[must_use]
    pub fn config_files(&self) -> Vec<PathBuf> {
        let ignored: Vec<&str> = self.ignored_sub_dirs.iter().map(String::as_str).collect();
        find_config_files(&self.plugin_dirs, &ignored)
    }

    /// Reads every discovered plugin.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`PluginInfo::from_config_file`].
    pub fn plugins_available(&self) -> Result<Vec<PluginInfo>> {
        self.config_files()
            .iter()
            .map(PluginInfo::from_config_file)
            .collect()
    }

    /// Loads every discovered plugin into a new [`HookCaller`], in discovery
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first discovery or load error. Libraries loaded before the
    /// failure are released.
    pub fn get_hook_caller(&self) -> Result<HookCaller> {
        let mut caller = HookCaller::new(self.catalog.clone())?.with_flags(self.flags);
        for plugin in self.plugins_available()? {
            load_plugin(&mut caller, &plugin)?;
        }
        Ok(caller)
    }
}

fn load_plugin(caller: &mut HookCaller, plugin: &PluginInfo) -> Result<()> {
    let loaded = caller.load_from_library_as(plugin.shared_lib_path(), plugin.id())?;
    info!(
        plugin_id = loaded.plugin_id(),
        hooks = ?loaded.hooks(),
        "loaded plugin"
    );
    Ok(())
}
