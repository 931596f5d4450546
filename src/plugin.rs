//! Plugin discovery through `plugin.yaml` configuration files.
//!
//! An installed plugin is a directory laid out as
//!
//! ```text
//! <plugin>/
//!     assets/plugin.yaml
//!     assets/README.md          (optional, used as the description)
//!     artifacts/<lib><id>.so    (or <id>.dll, lib<id>.dylib)
//! ```

use std::collections::BTreeMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::{HookCatalog, PLUGIN_ID_SYMBOL, call_marker};
use crate::error::{Error, Result};
use crate::loader::LoadedLibrary;

/// File name of a plugin configuration.
pub const CONFIG_FILE_NAME: &str = "plugin.yaml";

const NO_DESCRIPTION: &str = "Could not find a description";

/// Contents of a `plugin.yaml` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// User-facing plugin name.
    pub caption: String,
    /// Plugin version.
    pub version: String,
    /// Author name.
    pub author: String,
    /// Author e-mail.
    pub email: String,
    /// Plugin id, also the base name of the shared library.
    pub id: String,
    /// Requirements declared by the plugin, by name.
    #[serde(default)]
    pub requirements: BTreeMap<String, String>,
    /// Free-form extra information.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl PluginConfig {
    /// Parses configuration text. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginConfig`] if the text is not a valid plugin
    /// configuration.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::PluginConfig {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// File name of the plugin's shared library on this platform.
    #[must_use]
    pub fn shared_lib_name(&self) -> String {
        format!("{DLL_PREFIX}{}{DLL_SUFFIX}", self.id)
    }
}

/// An installed plugin, found through its configuration file.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    config: PluginConfig,
    yaml_location: PathBuf,
    shared_lib_path: PathBuf,
    description: String,
}

impl PluginInfo {
    /// Reads a `plugin.yaml` and checks the plugin it describes.
    ///
    /// If the shared library exports `get_plugin_id`, its value must match
    /// the configured id.
    ///
    /// # Errors
    ///
    /// * [`Error::PluginConfig`] if the file cannot be read or parsed.
    /// * [`Error::SharedLibraryNotFound`] if the library is not in the
    ///   plugin's `artifacts` directory.
    /// * [`Error::LibraryLoad`] if the library cannot be loaded.
    /// * [`Error::PluginIdMismatch`] if the exported id differs.
    pub fn from_config_file(yaml_location: impl AsRef<Path>) -> Result<Self> {
        let yaml_location = yaml_location.as_ref();
        let content = fs::read_to_string(yaml_location).map_err(|e| Error::PluginConfig {
            path: yaml_location.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = PluginConfig::from_yaml(&content, yaml_location)?;

        let assets_dir = yaml_location.parent().unwrap_or_else(|| Path::new("."));
        let plugin_dir = assets_dir.parent().unwrap_or_else(|| Path::new("."));
        let shared_lib_path = plugin_dir.join("artifacts").join(config.shared_lib_name());

        let description = fs::read_to_string(assets_dir.join("README.md"))
            .unwrap_or_else(|_| NO_DESCRIPTION.to_owned());

        let info = Self {
            config,
            yaml_location: yaml_location.to_path_buf(),
            shared_lib_path,
            description,
        };
        info.check_plugin_id()?;
        Ok(info)
    }

    fn check_shared_lib_exists(&self) -> Result<()> {
        if self.shared_lib_path.is_file() {
            Ok(())
        } else {
            Err(Error::SharedLibraryNotFound {
                path: self.shared_lib_path.clone(),
            })
        }
    }

    fn check_plugin_id(&self) -> Result<()> {
        self.check_shared_lib_exists()?;
        let library = LoadedLibrary::load(&self.shared_lib_path)?;
        let exported = library.resolve(PLUGIN_ID_SYMBOL).and_then(call_marker);
        library.unload()?;

        match exported {
            Some(found) if found != self.config.id => Err(Error::PluginIdMismatch {
                expected: self.config.id.clone(),
                found,
            }),
            Some(_) => Ok(()),
            None => {
                debug!(id = %self.config.id, "plugin does not export its id");
                Ok(())
            }
        }
    }

    /// Which catalog hooks the plugin's library exports, in catalog order.
    ///
    /// The library is loaded for the check and released before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SharedLibraryNotFound`] or [`Error::LibraryLoad`] if
    /// the library cannot be opened, [`Error::LibraryUnload`] if it cannot be
    /// released.
    pub fn hooks_implemented(&self, catalog: &HookCatalog) -> Result<Vec<String>> {
        self.check_shared_lib_exists()?;
        let library = LoadedLibrary::load(&self.shared_lib_path)?;
        let hooks = catalog
            .symbols()
            .filter(|(_, symbol)| library.resolve(symbol).is_some())
            .map(|(hook, _)| hook.to_owned())
            .collect();
        library.unload()?;
        Ok(hooks)
    }

    /// The parsed configuration.
    #[must_use]
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Plugin id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Location of the `plugin.yaml` this was read from.
    #[must_use]
    pub fn yaml_location(&self) -> &Path {
        &self.yaml_location
    }

    /// Location of the plugin's shared library.
    #[must_use]
    pub fn shared_lib_path(&self) -> &Path {
        &self.shared_lib_path
    }

    /// Contents of the plugin's `README.md`, or a placeholder.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Finds every `plugin.yaml` below the given directories, skipping files
/// under any sub-directory named in `ignored_sub_dirs` (relative to each
/// plugin directory).
///
/// Directories that do not exist contribute nothing. Results are ordered by
/// directory, then by path.
#[must_use]
pub fn find_config_files<P: AsRef<Path>>(
    plugin_dirs: &[P],
    ignored_sub_dirs: &[&str],
) -> Vec<PathBuf> {
    let mut config_files = Vec::new();

    for plugin_dir in plugin_dirs {
        let plugin_dir = normalize_dir(plugin_dir.as_ref());
        let Some(dir) = plugin_dir.to_str() else {
            warn!(dir = %plugin_dir.display(), "skipping plugin directory with a non UTF-8 path");
            continue;
        };
        let pattern = if dir.is_empty() {
            format!("**/{CONFIG_FILE_NAME}")
        } else {
            format!("{}/**/{CONFIG_FILE_NAME}", glob::Pattern::escape(dir))
        };
        let Ok(paths) = glob::glob(&pattern) else {
            continue;
        };

        config_files.extend(paths.filter_map(std::result::Result::ok).filter(|path| {
            let relative = path.strip_prefix(&plugin_dir).unwrap_or(path);
            !ignored_sub_dirs.iter().any(|name| relative.starts_with(name))
        }));
    }

    config_files
}

/// Drops `.` components and trailing separators, so that the directory
/// compares equal to the prefix of the paths `glob` returns for it. The
/// current directory becomes the empty path.
fn normalize_dir(dir: &Path) -> PathBuf {
    dir.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
caption: 'Simple Plugin'
version: '1.0.0'
author: 'ESSS'
email: 'acme@example.com'
id: 'acme_simple'
requirements:
  acme: '>=1.0'
";

    #[test]
    fn parses_config() {
        let config = PluginConfig::from_yaml(CONFIG, Path::new("plugin.yaml")).unwrap();

        assert_eq!(config.caption, "Simple Plugin");
        assert_eq!(config.id, "acme_simple");
        assert_eq!(config.requirements.get("acme").map(String::as_str), Some(">=1.0"));
        assert!(config.extras.is_empty());
        assert_eq!(
            config.shared_lib_name(),
            format!("{DLL_PREFIX}acme_simple{DLL_SUFFIX}")
        );
    }

    #[test]
    fn missing_field_is_a_config_error() {
        let err =
            PluginConfig::from_yaml("caption: 'x'\n", Path::new("broken/plugin.yaml")).unwrap_err();

        match err {
            Error::PluginConfig { path, message } => {
                assert_eq!(path, Path::new("broken/plugin.yaml"));
                assert!(message.contains("missing field"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let text = format!("{CONFIG}shared_lib: 'x'\n");

        assert!(PluginConfig::from_yaml(&text, Path::new("plugin.yaml")).is_err());
    }

    #[test]
    fn finds_configs_and_honours_ignored_dirs() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["a", "b", "skip/x"] {
            let assets = root.path().join(dir).join("assets");
            fs::create_dir_all(&assets).unwrap();
            fs::write(assets.join(CONFIG_FILE_NAME), CONFIG).unwrap();
        }

        let all = find_config_files(&[root.path()], &[]);
        assert_eq!(all.len(), 3);

        let kept = find_config_files(&[root.path()], &["skip"]);
        assert_eq!(
            kept,
            vec![
                root.path().join("a").join("assets").join(CONFIG_FILE_NAME),
                root.path().join("b").join("assets").join(CONFIG_FILE_NAME),
            ]
        );
    }

    #[test]
    fn missing_directory_finds_nothing() {
        assert!(find_config_files(&[Path::new("/no/such/plugin/dir")], &[]).is_empty());
    }

    #[test]
    fn config_without_library_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let assets = root.path().join("simple").join("assets");
        fs::create_dir_all(&assets).unwrap();
        let yaml = assets.join(CONFIG_FILE_NAME);
        fs::write(&yaml, CONFIG).unwrap();

        let err = PluginInfo::from_config_file(&yaml).unwrap_err();
        assert!(matches!(err, Error::SharedLibraryNotFound { .. }));
    }

    #[test]
    fn current_dir_components_are_dropped() {
        assert_eq!(normalize_dir(Path::new(".")), PathBuf::new());
        assert_eq!(normalize_dir(Path::new("./")), PathBuf::new());
        assert_eq!(normalize_dir(Path::new("./plugins/")), PathBuf::from("plugins"));
        assert_eq!(normalize_dir(Path::new("/opt/plugins/.")), PathBuf::from("/opt/plugins"));
    }

    #[test]
    fn relative_plugin_dirs_honour_ignored_dirs() {
        let root = tempfile::Builder::new()
            .prefix("plugins")
            .tempdir_in(".")
            .unwrap();
        for dir in ["keep", "skip"] {
            let assets = root.path().join(dir).join("assets");
            fs::create_dir_all(&assets).unwrap();
            fs::write(assets.join(CONFIG_FILE_NAME), CONFIG).unwrap();
        }
        let expected = Path::new("keep").join("assets").join(CONFIG_FILE_NAME);

        let dir = Path::new(".").join(root.path().file_name().unwrap());
        let with_separator = PathBuf::from(format!("{}/", dir.display()));
        for plugin_dir in [dir, with_separator] {
            let found = find_config_files(&[&plugin_dir], &["skip"]);

            assert_eq!(found.len(), 1, "{}: {found:?}", plugin_dir.display());
            assert!(found[0].ends_with(&expected));
        }
    }
}
