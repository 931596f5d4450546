//! Shared helpers for the integration tests: builds the fixture plugins and
//! declares the `acme` catalog they implement.
#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::c_int;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, Once};

static BUILD: Once = Once::new();
static TARGET_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    std::env::var_os("CARGO_TARGET_DIR")
        .map_or_else(
            || Path::new(env!("CARGO_MANIFEST_DIR")).join("target"),
            PathBuf::from,
        )
        .join("debug")
});

hookman::hook_catalog! {
    /// Hooks of the ACME test application.
    pub mod acme {
        project = "acme";
        version = "1";

        unsafe extern "C" {
            /// Docs for Friction Factor
            fn friction_factor(v1: c_int, v2: c_int) -> c_int;
            /// Docs for Environment Temperature
            fn env_temperature(v3: f64, v4: f64) -> f64;
        }
    }
}

/// Id exported by the `acme-simple` fixture.
pub const SIMPLE_ID: &str = "acme_simple";
/// Id inferred from the file name of the `acme-partial` fixture.
pub const PARTIAL_ID: &str = "acme_partial";

fn build_plugins() {
    BUILD.call_once(|| {
        let result = Command::new(env!("CARGO"))
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .args(["build", "-p", "acme-simple", "-p", "acme-partial"])
            .output()
            .expect("failed to execute cargo build");

        assert!(
            result.status.success(),
            "Plugin build failed:\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&result.stdout),
            String::from_utf8_lossy(&result.stderr)
        );
    });
}

/// Path of a fixture plugin library, building the fixtures on first use.
pub fn plugin_path(name: &str) -> PathBuf {
    build_plugins();
    let path = TARGET_DIR.join(format!("{DLL_PREFIX}{name}{DLL_SUFFIX}"));
    assert!(path.is_file(), "missing plugin library {}", path.display());
    path
}

pub fn simple_plugin() -> PathBuf {
    plugin_path(SIMPLE_ID)
}

pub fn partial_plugin() -> PathBuf {
    plugin_path(PARTIAL_ID)
}

/// Installs a fixture library as a plugin under `root/<dir>`, with a
/// `plugin.yaml` declaring `id`. The library is copied as `<id>`'s file name.
pub fn install_plugin(root: &Path, dir: &str, library: &Path, id: &str) -> PathBuf {
    let plugin = root.join(dir);
    let assets = plugin.join("assets");
    let artifacts = plugin.join("artifacts");
    fs::create_dir_all(&assets).unwrap();
    fs::create_dir_all(&artifacts).unwrap();

    let yaml = assets.join("plugin.yaml");
    fs::write(
        &yaml,
        format!(
            "caption: '{id}'\n\
             version: '1.0.0'\n\
             author: 'ESSS'\n\
             email: 'acme@example.com'\n\
             id: '{id}'\n"
        ),
    )
    .unwrap();
    fs::copy(
        library,
        artifacts.join(format!("{DLL_PREFIX}{id}{DLL_SUFFIX}")),
    )
    .unwrap();
    yaml
}
