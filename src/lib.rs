//! An in-memory, POSIX-like virtual filesystem.
//!
//! [`Vfs`] is the entry point: it owns the tree of nodes and exposes
//! path-addressed operations (`mkdir`, `open_file`, `rename`, `link`, ...)
//! plus handle-addressed operations reached through [`handle::OpenFile`]
//! (`read`, `write`, `readdir`, ...). Every operation that can fail
//! returns [`error::Error`], which wraps either a [`error::PathError`] or
//! a [`error::LinkError`] carrying a stable [`error::ErrorKind`].
//!
//! Symbolic links, ownership, and `chroot` are accepted at the API level
//! but always fail with `permission-denied` — this filesystem has no
//! concept of users or link targets, so there is nothing to emulate.

pub mod error;
pub mod fileinfo;
pub mod flags;
pub mod handle;
mod node;
pub mod options;
pub mod path;
pub mod vfs;

pub use error::{Error, ErrorKind, LinkError, PathError, ReadError, VfsResult};
pub use fileinfo::FileInfo;
pub use flags::OpenFlags;
pub use handle::{OpenFile, Whence};
pub use options::VfsOptions;
pub use vfs::Vfs;
