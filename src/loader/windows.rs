use std::ffi::{OsString, c_void};
use std::os::windows::ffi::OsStringExt;
use std::path::Path;

use libloading::os::windows::{
    LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR, Library as OsLibrary,
};

use super::{encode_wide, load_error};
use crate::error::{Error, Result};
use crate::flags::LoadFlags;
use crate::symbol::RawSymbol;

pub(super) struct Library(OsLibrary);

/// The UTF-8 path is made absolute and converted to UTF-16 before
/// `LoadLibraryExW` sees it.
///
/// The library's own directory is searched for its dependencies, so plugins
/// can ship their DLLs next to them.
pub(super) fn open(path: &Path, _flags: LoadFlags) -> Result<Library> {
    let absolute = std::path::absolute(path).map_err(|e| Error::LibraryLoad {
        path: path.to_path_buf(),
        diagnostic: e.to_string(),
    })?;
    let mut wide = encode_wide(&absolute).map_err(|reason| Error::PathEncoding {
        path: path.to_path_buf(),
        reason,
    })?;
    wide.pop();
    let native = OsString::from_wide(&wide);

    // SAFETY: running the library's initialisers is the caller's trust
    // decision, documented on `LoadedLibrary::load`.
    unsafe {
        OsLibrary::load_with_flags(
            native,
            LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_DEFAULT_DIRS,
        )
    }
    .map(Library)
    .map_err(|e| load_error(path, &e))
}

impl Library {
    pub(super) fn symbol(&self, name: &str) -> Option<RawSymbol> {
        // SAFETY: the symbol is only read as an address, never dereferenced.
        let symbol = unsafe { self.0.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        RawSymbol::new(*symbol)
    }

    pub(super) fn close(self) -> std::result::Result<(), libloading::Error> {
        self.0.close()
    }
}
