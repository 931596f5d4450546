use std::ffi::c_void;
use std::path::Path;

use libloading::os::unix::{Library as OsLibrary, RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

use super::load_error;
use crate::error::Result;
use crate::flags::LoadFlags;
use crate::symbol::RawSymbol;

pub(super) struct Library(OsLibrary);

fn mode(flags: LoadFlags) -> i32 {
    let binding = if flags.binds_now() { RTLD_NOW } else { RTLD_LAZY };
    let visibility = if flags.contains(LoadFlags::GLOBAL) {
        RTLD_GLOBAL
    } else {
        RTLD_LOCAL
    };
    binding | visibility
}

/// The path is handed to `dlopen` unchanged.
pub(super) fn open(path: &Path, flags: LoadFlags) -> Result<Library> {
    // SAFETY: running the library's initialisers is the caller's trust
    // decision, documented on `LoadedLibrary::load`.
    unsafe { OsLibrary::open(Some(path), mode(flags)) }
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
