//! Error and result types returned by the hook loading machinery.

use std::path::PathBuf;

use thiserror::Error;

/// The result type returned by fallible `hookman` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error `hookman` can report.
///
/// The load/resolve/call cycle reports [`Error::LibraryLoad`],
/// [`Error::PathEncoding`], [`Error::LibraryUnload`], [`Error::HookNotRegistered`]
/// and [`Error::ForeignHook`]. A symbol missing from a library is never an
/// error, it just leaves that hook unimplemented by the library. The remaining
/// variants are reported by catalog validation and plugin discovery.
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system refused to load a shared library.
    ///
    /// `diagnostic` is the message captured from the platform loader at the
    /// point of failure (`dlerror()` text, or the Windows error code and its
    /// description).
    #[error("Error loading library {}: {diagnostic}", path.display())]
    LibraryLoad {
        /// Path that was handed to the loader.
        path: PathBuf,
        /// Platform diagnostic.
        diagnostic: String,
    },
    /// The operating system refused to release a shared library.
    #[error("Error unloading library {}: {diagnostic}", path.display())]
    LibraryUnload {
        /// Path the library was loaded from.
        path: PathBuf,
        /// Platform diagnostic.
        diagnostic: String,
    },
    /// The library path could not be converted into the loader's native
    /// path encoding.
    #[error("Error loading library {}: {reason}", path.display())]
    PathEncoding {
        /// Path that failed to convert.
        path: PathBuf,
        /// Why the conversion failed.
        reason: PathEncodingError,
    },
    /// The single-implementation accessor was used for a hook that no loaded
    /// library implements.
    #[error("hook `{hook}` is not implemented by any loaded library")]
    HookNotRegistered {
        /// Logical hook name.
        hook: String,
    },
    /// A hook definition from one catalog was used with a caller or registry
    /// built from another.
    #[error("hook `{hook}` was declared for catalog `{declared_for}`, not `{expected}`")]
    ForeignHook {
        /// Logical hook name.
        hook: String,
        /// Project and version the definition was declared for.
        declared_for: String,
        /// Project and version of the catalog in use.
        expected: String,
    },
    /// A hook catalog is malformed.
    #[error("invalid hook catalog: {0}")]
    InvalidCatalog(String),
    /// A `plugin.yaml` could not be read or parsed.
    #[error("invalid plugin configuration {}: {message}", path.display())]
    PluginConfig {
        /// The configuration file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
    /// A plugin configuration points at a shared library that does not exist.
    #[error("shared library {} could not be found", path.display())]
    SharedLibraryNotFound {
        /// Expected location of the library.
        path: PathBuf,
    },
    /// The plugin id exported by a library disagrees with its configuration.
    #[error(
        "the plugin id inside plugin.yaml is \"{expected}\" while the plugin id inside the shared library is \"{found}\""
    )]
    PluginIdMismatch {
        /// Id from `plugin.yaml`.
        expected: String,
        /// Id returned by the library's `get_plugin_id` export.
        found: String,
    },
}

/// Reasons a path cannot be converted to the platform's native wide encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathEncodingError {
    /// The path contains data with no Unicode translation.
    #[error("path has no unicode translation")]
    NoUnicodeTranslation,
    /// The path contains a NUL character, which would truncate it.
    #[error("path contains a NUL character at offset {offset}")]
    InteriorNul {
        /// Offset of the NUL in UTF-16 code units.
        offset: usize,
    },
}

impl Error {
    /// Returns `true` for the errors raised when a shared library could not be
    /// opened, whatever the platform-specific cause.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, Error::LibraryLoad { .. } | Error::PathEncoding { .. })
    }
}
