//! Structured error types for VFS operations (spec.md §7).
//!
//! Two wrapper shapes, mirroring `os.PathError` / `os.LinkError`: most
//! operations fail with [`PathError`] (an operation name, the caller's
//! path, and a [`ErrorKind`]); link-like operations that involve two paths
//! fail with [`LinkError`]. End-of-stream on a read-shaped operation is
//! modeled separately as [`ReadError::Eof`], since spec.md is explicit that
//! `eof` is a bare sentinel, not a kind carried inside `PathError`.

use std::fmt;

/// The fixed error-kind taxonomy from spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `no-such-file-or-directory`
    NotExist,
    /// `not-a-directory`
    NotDir,
    /// `is-a-directory`
    IsDir,
    /// `file-exists`
    Exist,
    /// `directory-not-empty`
    NotEmpty,
    /// `operation-not-permitted`
    NotPermitted,
    /// `permission-denied`
    PermissionDenied,
    /// `bad-file-descriptor`
    BadFileDescriptor,
    /// `negative-offset`
    NegativeOffset,
    /// `closed`
    Closed,
    /// `file-closing`
    FileClosing,
    /// `invalid`
    Invalid,
}

impl ErrorKind {
    /// The kebab-case name used in spec.md §7, stable for test oracles.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotExist => "no-such-file-or-directory",
            ErrorKind::NotDir => "not-a-directory",
            ErrorKind::IsDir => "is-a-directory",
            ErrorKind::Exist => "file-exists",
            ErrorKind::NotEmpty => "directory-not-empty",
            ErrorKind::NotPermitted => "operation-not-permitted",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::BadFileDescriptor => "bad-file-descriptor",
            ErrorKind::NegativeOffset => "negative-offset",
            ErrorKind::Closed => "closed",
            ErrorKind::FileClosing => "file-closing",
            ErrorKind::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-path operation failure: `{op} {path}: {err}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub op: &'static str,
    pub path: String,
    pub err: ErrorKind,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.path, self.err)
    }
}

impl std::error::Error for PathError {}

/// A two-path operation failure (`link`, `rename`, `symlink`):
/// `{op} {old} {new}: {err}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub op: &'static str,
    pub old: String,
    pub new: String,
    pub err: ErrorKind,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}: {}", self.op, self.old, self.new, self.err)
    }
}

impl std::error::Error for LinkError {}

/// Top-level error returned by every path-addressed [`crate::vfs::Vfs`]
/// operation and by [`crate::handle::OpenFile`] operations that are not
/// read-shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Path(PathError),
    Link(LinkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Path(e) => e.fmt(f),
            Error::Link(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<PathError> for Error {
    fn from(e: PathError) -> Self {
        Error::Path(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

/// Result alias used throughout the crate.
pub type VfsResult<T> = Result<T, Error>;

/// Error returned by the read-shaped handle operations (`read`, `read_at`,
/// `readdir`, `readdirnames`): either end-of-stream, or an ordinary
/// [`PathError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    Eof,
    Op(PathError),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Eof => f.write_str("eof"),
            ReadError::Op(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<PathError> for ReadError {
    fn from(e: PathError) -> Self {
        ReadError::Op(e)
    }
}

/// Builds a [`PathError`] wrapped in [`Error::Path`].
pub(crate) fn path_err(op: &'static str, path: &str, err: ErrorKind) -> Error {
    Error::Path(PathError { op, path: path.to_string(), err })
}

/// Builds a [`LinkError`] wrapped in [`Error::Link`].
pub(crate) fn link_err(op: &'static str, old: &str, new: &str, err: ErrorKind) -> Error {
    Error::Link(LinkError { op, old: old.to_string(), new: new.to_string(), err })
}
