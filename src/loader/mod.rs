//! Opening shared libraries and resolving symbols inside them.
//!
//! The platform backend is chosen at build time: `dlopen`/`dlsym` on Unix and
//! `LoadLibraryExW`/`GetProcAddress` on Windows. Building for any other
//! target is an error. Whatever the platform, a failed load is reported as
//! [`Error::LibraryLoad`] carrying the loader's own diagnostic.

use std::error::Error as _;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

use cfg_if::cfg_if;
use tracing::{debug, trace};

use crate::error::{Error, PathEncodingError, Result};
use crate::flags::LoadFlags;
use crate::symbol::RawSymbol;

cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as imp;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as imp;
    } else {
        compile_error!("hookman can only load plugins on unix and windows targets");
    }
}

/// A shared library loaded into the process.
///
/// The library stays loaded until the value is [unloaded](Self::unload) or
/// dropped, which happens exactly once since both consume it.
pub struct LoadedLibrary {
    path: PathBuf,
    inner: imp::Library,
}

impl LoadedLibrary {
    /// Loads the library at `path` with the default [`LoadFlags`].
    ///
    /// Loading runs the library's initialisation routines; only load
    /// libraries you trust.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryLoad`] if the file is missing, has the wrong
    /// format or architecture, has unresolved dependencies, or cannot be
    /// read. On Windows, [`Error::PathEncoding`] is returned when the path
    /// cannot be converted to a wide string.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_flags(path, LoadFlags::default())
    }

    /// Loads the library at `path` with explicit [`LoadFlags`].
    ///
    /// # Errors
    ///
    /// See [`LoadedLibrary::load`].
    pub fn load_with_flags(path: impl AsRef<Path>, flags: LoadFlags) -> Result<Self> {
        let path = path.as_ref();
        let inner = imp::open(path, flags)?;
        debug!(path = %path.display(), ?flags, "loaded library");

        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    /// Looks up an exported symbol.
    ///
    /// A missing symbol is not an error: plugins are free to implement only
    /// part of a catalog.
    #[must_use]
    pub fn resolve(&self, symbol: &str) -> Option<RawSymbol> {
        let resolved = self.inner.symbol(symbol);
        if resolved.is_none() {
            trace!(path = %self.path.display(), symbol, "symbol not exported");
        }
        resolved
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unloads the library, reporting any error from the platform loader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryUnload`] carrying the loader diagnostic if the
    /// platform refused to release the library.
    pub fn unload(self) -> Result<()> {
        let Self { path, inner } = self;
        inner
            .close()
            .map_err(|e| Error::LibraryUnload {
                diagnostic: diagnostic(&e),
                path: path.clone(),
            })?;
        debug!(path = %path.display(), "unloaded library");
        Ok(())
    }
}

impl fmt::Debug for LoadedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Formats a loader error together with its chain of causes.
fn diagnostic(err: &libloading::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(message, ": {cause}");
        source = cause.source();
    }
    message
}

fn load_error(path: &Path, err: &libloading::Error) -> Error {
    Error::LibraryLoad {
        path: path.to_path_buf(),
        diagnostic: diagnostic(err),
    }
}

/// Converts a path to a NUL-terminated UTF-16 string for the wide Windows
/// loader entry points.
#[cfg_attr(not(windows), allow(dead_code))]
fn encode_wide(path: &Path) -> std::result::Result<Vec<u16>, PathEncodingError> {
    let utf8 = path.to_str().ok_or(PathEncodingError::NoUnicodeTranslation)?;
    let mut wide: Vec<u16> = utf8.encode_utf16().collect();
    if let Some(offset) = wide.iter().position(|&unit| unit == 0) {
        return Err(PathEncodingError::InteriorNul { offset });
    }
    wide.push(0);
    Ok(wide)
}
