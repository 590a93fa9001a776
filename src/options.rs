//! Construction options for [`crate::vfs::Vfs`] (spec.md §6).

/// Options controlling how a fresh [`crate::vfs::Vfs`] is populated.
#[derive(Debug, Clone, Copy, Default)]
pub struct VfsOptions {
    /// When set, `/home`, `/root`, and `/tmp` are created at mode `0o755`
    /// immediately after construction.
    pub precreate_standard_dirs: bool,
}

impl VfsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard_dirs(mut self) -> Self {
        self.precreate_standard_dirs = true;
        self
    }
}
