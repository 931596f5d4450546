#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docs, feature(doc_cfg))]

pub mod caller;
pub mod catalog;
pub mod error;
pub mod flags;
pub mod loader;
#[macro_use]
pub mod macros;
pub mod manager;
pub mod plugin;
pub mod registry;
pub mod symbol;

pub use caller::{HookCaller, LoadedPlugin};
pub use catalog::{HookCatalog, HookDef};
pub use error::{Error, Result};
pub use flags::LoadFlags;
pub use manager::HookMan;
pub use symbol::{Hook, HookFn, RawSymbol};

/// A module typically glob-imported containing the types needed to declare a
/// catalog and call hooks.
pub mod prelude {
    pub use crate::caller::{HookCaller, LoadedPlugin};
    pub use crate::catalog::{HookCatalog, HookDef};
    pub use crate::error::{Error, Result};
    pub use crate::flags::LoadFlags;
    pub use crate::hook_catalog;
    pub use crate::manager::HookMan;
    pub use crate::symbol::Hook;
}

/// `hookman` version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
