//! `FileInfo` and the mode-bit conventions shared by nodes and callers.

/// High bit of `mode` marking a directory, matching Go's `os.ModeDir`.
pub const MODE_DIR: u32 = 1 << 31;

/// Mask of the permission bits proper (the low nine bits).
pub const PERM_MASK: u32 = 0o777;

/// Default permissions for the pre-created standard directories
/// (`/home`, `/root`, `/tmp`) from spec.md §6.
pub const STANDARD_DIR_MODE: u32 = 0o755;

/// Snapshot of a node's metadata, per spec.md §6's `FileInfo` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    /// Bytes for files, child count for directories (spec.md §9: kept as
    /// documented even though it is idiosyncratic for directories).
    pub size: i64,
    /// Permission bits plus [`MODE_DIR`] when the entry is a directory.
    pub mode: u32,
    /// Nanoseconds since the Unix epoch.
    pub modtime: i64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }
}
