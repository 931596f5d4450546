//! Flags controlling how plugin libraries are opened.

use bitflags::bitflags;

bitflags! {
    /// Options passed to the platform loader when a library is opened.
    ///
    /// Only meaningful on Unix, where they map onto the `dlopen` mode. The
    /// Windows loader has no binding mode and ignores them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        /// Resolve function references when they are first called (`RTLD_LAZY`).
        const LAZY = 1 << 0;
        /// Resolve every reference before `load` returns (`RTLD_NOW`). Takes
        /// precedence over [`LoadFlags::LAZY`].
        const NOW = 1 << 1;
        /// Make the library's symbols available to libraries loaded later
        /// (`RTLD_GLOBAL`). Libraries are loaded `RTLD_LOCAL` otherwise.
        const GLOBAL = 1 << 2;
    }
}

impl Default for LoadFlags {
    fn default() -> Self {
        Self::LAZY
    }
}

impl LoadFlags {
    /// Whether all references should be bound eagerly.
    #[must_use]
    pub fn binds_now(self) -> bool {
        self.contains(Self::NOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lazy_and_local() {
        let flags = LoadFlags::default();

        assert!(!flags.binds_now());
        assert!(!flags.contains(LoadFlags::GLOBAL));
    }

    #[test]
    fn now_wins_over_lazy() {
        assert!((LoadFlags::LAZY | LoadFlags::NOW).binds_now());
    }
}
