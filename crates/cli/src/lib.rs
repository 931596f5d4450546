#![doc = include_str!("../README.md")]

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result as AResult, bail};
use clap::Parser;
use hookman::plugin::PluginInfo;
use hookman::{HookCaller, HookCatalog, HookMan};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the `tracing` filter for the CLI.
pub const LOG_ENV: &str = "HOOKMAN_LOG";

/// Result type returned from the [`run`] function.
pub type CrateResult = AResult<()>;

/// Runs the CLI application. Returns nothing in a result on success.
///
/// # Errors
///
/// Returns an error if the application fails to run.
pub fn run() -> CrateResult {
    init_logging();
    let output = Args::parse().handle()?;
    print!("{output}");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Fails only if a subscriber is already installed, which is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[clap(
    about = "Inspects hookman plugin libraries and lists installed plugins.",
    version = env!("CARGO_PKG_VERSION")
)]
enum Args {
    /// Loads a plugin library and reports which catalog hooks it implements.
    ///
    /// The library is loaded with the same loader hosts use, so this also
    /// shows whether it can be loaded at all on this machine.
    Inspect(Inspect),
    /// Lists the plugins installed in a set of plugin directories.
    ///
    /// Every `plugin.yaml` below the directories is read. When no directory
    /// is given, the directories in `HOOKMAN_PLUGIN_PATH` are searched.
    List(List),
}

#[derive(Parser)]
struct Inspect {
    /// Path to the plugin's shared library.
    library: PathBuf,
    /// Project name of the hook catalog.
    #[arg(long)]
    project: String,
    /// Version of the hook catalog.
    #[arg(long)]
    api_version: String,
    /// Hook of the catalog. Repeat for every hook.
    #[arg(long = "hook", required = true)]
    hooks: Vec<String>,
}

#[derive(Parser)]
struct List {
    /// Plugin directories to search.
    dirs: Vec<PathBuf>,
    /// Sub-directory of the plugin directories to skip. May be repeated.
    #[arg(long)]
    ignore: Vec<String>,
    /// Project name of a catalog to report implemented hooks against.
    #[arg(long, requires = "api_version")]
    project: Option<String>,
    /// Version of that catalog.
    #[arg(long, requires = "project")]
    api_version: Option<String>,
    /// Hook of that catalog. Repeat for every hook.
    #[arg(long = "hook", requires = "project")]
    hooks: Vec<String>,
}

impl Args {
    fn handle(self) -> AResult<String> {
        match self {
            Args::Inspect(inspect) => inspect.handle(),
            Args::List(list) => list.handle(),
        }
    }
}

impl Inspect {
    fn handle(self) -> AResult<String> {
        let catalog = HookCatalog::new(self.project, self.api_version, self.hooks);
        let mut caller = HookCaller::new(catalog).context("Invalid hook catalog")?;
        caller
            .load_from_library(&self.library)
            .with_context(|| format!("Failed to load `{}`", self.library.display()))?;
        let plugin = &caller.plugins()[0];

        let mut out = String::new();
        writeln!(out, "plugin id:   {}", plugin.plugin_id())?;
        writeln!(
            out,
            "api version: {}",
            plugin.version_api().as_deref().unwrap_or("(not exported)")
        )?;
        for (hook, symbol) in caller.catalog().symbols() {
            let state = if plugin.implements(hook) {
                "implemented"
            } else {
                "missing"
            };
            writeln!(out, "  {hook:<24} {state:<12} {symbol}")?;
        }

        caller.close().context("Failed to unload the library")?;
        Ok(out)
    }
}

impl List {
    fn handle(self) -> AResult<String> {
        let catalog = match (self.project, self.api_version) {
            (Some(project), Some(version)) => {
                if self.hooks.is_empty() {
                    bail!("At least one `--hook` is required with `--project`.");
                }
                let catalog = HookCatalog::new(project, version, self.hooks);
                catalog.validate().context("Invalid hook catalog")?;
                Some(catalog)
            }
            _ => None,
        };

        let hookman = if self.dirs.is_empty() {
            HookMan::from_env(catalog.clone().unwrap_or_else(empty_catalog))
        } else {
            HookMan::new(catalog.clone().unwrap_or_else(empty_catalog), self.dirs)
        };
        let hookman = self
            .ignore
            .into_iter()
            .fold(hookman, HookMan::ignore_sub_dir);
        debug!(dirs = ?hookman.plugin_dirs(), "searching for plugins");

        let plugins = hookman
            .plugins_available()
            .context("Failed to read installed plugins")?;

        let mut out = String::new();
        if plugins.is_empty() {
            writeln!(out, "No plugins found.")?;
        }
        for plugin in &plugins {
            write_plugin(&mut out, plugin, catalog.as_ref())?;
        }
        Ok(out)
    }
}

fn empty_catalog() -> HookCatalog {
    HookCatalog::new("hookman", "0", Vec::<String>::new())
}

fn write_plugin(out: &mut String, plugin: &PluginInfo, catalog: Option<&HookCatalog>) -> AResult<()> {
    let config = plugin.config();
    writeln!(out, "{} ({} {})", config.id, config.caption, config.version)?;
    writeln!(out, "  author:  {} <{}>", config.author, config.email)?;
    writeln!(out, "  library: {}", plugin.shared_lib_path().display())?;
    if let Some(catalog) = catalog {
        let hooks = plugin
            .hooks_implemented(catalog)
            .with_context(|| format!("Failed to inspect `{}`", config.id))?;
        writeln!(out, "  hooks:   {}", hooks.join(", "))?;
    }
    Ok(())
}
