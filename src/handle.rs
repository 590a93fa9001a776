//! Open-file handles (spec.md §4.4, §4.5).
//!
//! An [`OpenFile`] pairs a [`Node`] with per-handle cursor state: a byte
//! offset for regular files, a resumable sorted-name cursor for
//! directories. Two handles on the same node see each other's writes
//! immediately, since both hold the same `Arc<Node>` — there is no
//! per-handle buffering.

use std::sync::RwLock;

use tracing::trace;

use crate::error::{path_err, Error, ErrorKind, PathError, ReadError, VfsResult};
use crate::fileinfo::FileInfo;
use crate::node::Node;
use crate::vfs::Vfs;
use std::sync::Arc;

/// Seek origin, mirroring `io.Seek{Start,Current,End}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

#[derive(Debug)]
struct HandleState {
    /// `None` once `close` has run; every subsequent call fails `closed`.
    node: Option<Arc<Node>>,
    offset: i64,
    /// Sorted names not yet returned by `readdir`/`readdirnames`, lazily
    /// populated on first call so a plain file handle never pays for it.
    dir_cursor: Option<Vec<String>>,
}

/// A handle returned by [`Vfs::open_file`] (spec.md §4.4).
#[derive(Debug)]
pub struct OpenFile {
    vfs: Vfs,
    name: String,
    read: bool,
    write: bool,
    state: RwLock<HandleState>,
}

impl OpenFile {
    pub(crate) fn new(vfs: Vfs, name: String, node: Arc<Node>, read: bool, write: bool, offset: i64) -> OpenFile {
        OpenFile {
            vfs,
            name,
            read,
            write,
            state: RwLock::new(HandleState { node: Some(node), offset, dir_cursor: None }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Universal precondition from spec.md §4.4: an empty stored name is
    /// always `invalid`, checked ahead of anything else.
    fn check_name(&self, op: &'static str) -> VfsResult<()> {
        if self.name.is_empty() {
            return Err(path_err(op, &self.name, ErrorKind::Invalid));
        }
        Ok(())
    }

    fn node_or_closed(&self, op: &'static str) -> VfsResult<Arc<Node>> {
        self.check_name(op)?;
        let state = self.state.read().unwrap();
        state.node.clone().ok_or_else(|| path_err(op, &self.name, ErrorKind::Closed))
    }

    /// Same as [`OpenFile::node_or_closed`] but reports `file-closing`
    /// instead of `closed` on a closed handle, per spec.md §7's split
    /// between ordinary I/O and directory iteration.
    fn node_or_file_closing(&self, op: &'static str) -> VfsResult<Arc<Node>> {
        self.check_name(op)?;
        let state = self.state.read().unwrap();
        state.node.clone().ok_or_else(|| path_err(op, &self.name, ErrorKind::FileClosing))
    }

    pub fn stat(&self) -> VfsResult<FileInfo> {
        let node = self.node_or_closed("stat")?;
        let leaf = crate::path::base(&self.name);
        Ok(node.fill_stat_from(&leaf))
    }

    pub fn close(&self) -> VfsResult<()> {
        let mut state = self.state.write().unwrap();
        if state.node.take().is_none() {
            return Err(path_err("close", &self.name, ErrorKind::FileClosing));
        }
        state.dir_cursor = None;
        trace!(op = "close", path = %self.name, "closed handle");
        Ok(())
    }

    /// No-op: there is nothing to flush in an in-memory filesystem, but
    /// the call still validates the handle is open (spec.md §4.4).
    pub fn sync(&self) -> VfsResult<()> {
        self.node_or_closed("sync")?;
        Ok(())
    }

    pub fn chmod(&self, mode: u32) -> VfsResult<()> {
        let node = self.node_or_closed("chmod")?;
        node.set_mode(mode);
        Ok(())
    }

    /// Changes the process working directory to this handle's directory
    /// (spec.md §4.5); fails `not-a-directory` for a file handle.
    pub fn chdir(&self) -> VfsResult<()> {
        let node = self.node_or_closed("chdir")?;
        if !node.is_dir() {
            return Err(path_err("chdir", &self.name, ErrorKind::NotDir));
        }
        self.vfs.chdir(&self.name)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, ReadError> {
        const OP: &str = "read";
        let node = self.node_or_closed(OP).map_err(as_read_error)?;
        if node.is_dir() {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::IsDir }));
        }
        if !self.read {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::BadFileDescriptor }));
        }
        let mut state = self.state.write().unwrap();
        let off = state.offset as u64;
        if off >= node.data_len() && !buf.is_empty() {
            return Err(ReadError::Eof);
        }
        let n = node.read_at(off, buf);
        state.offset += n as i64;
        Ok(n)
    }

    /// Reads at an explicit offset without moving the handle's cursor.
    pub fn read_at(&self, offset: i64, buf: &mut [u8]) -> Result<usize, ReadError> {
        const OP: &str = "readat";
        let node = self.node_or_closed(OP).map_err(as_read_error)?;
        if offset < 0 {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::NegativeOffset }));
        }
        if node.is_dir() {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::IsDir }));
        }
        if !self.read {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::BadFileDescriptor }));
        }
        if offset as u64 >= node.data_len() && !buf.is_empty() {
            return Err(ReadError::Eof);
        }
        Ok(node.read_at(offset as u64, buf))
    }

    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        const OP: &str = "write";
        let node = self.node_or_closed(OP)?;
        if node.is_dir() || !self.write {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        let mut state = self.state.write().unwrap();
        let off = if state.offset < 0 { 0 } else { state.offset as u64 };
        let n = node.write_at_extending(off, buf);
        state.offset = off as i64 + n as i64;
        Ok(n)
    }

    pub fn write_at(&self, offset: i64, buf: &[u8]) -> VfsResult<usize> {
        const OP: &str = "writeat";
        let node = self.node_or_closed(OP)?;
        if offset < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::NegativeOffset));
        }
        if node.is_dir() || !self.write {
            return Err(path_err(OP, &self.name, ErrorKind::BadFileDescriptor));
        }
        Ok(node.write_at_extending(offset as u64, buf))
    }

    /// A directory handle silently reports position zero, per spec.md
    /// §4.4: seek is meaningless for directory iteration, which has its
    /// own cursor.
    pub fn seek(&self, offset: i64, whence: Whence) -> VfsResult<i64> {
        const OP: &str = "seek";
        let node = self.node_or_closed(OP)?;
        if node.is_dir() {
            return Ok(0);
        }
        let mut state = self.state.write().unwrap();
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => state.offset,
            Whence::End => node.data_len() as i64,
        };
        let new_offset = base + offset;
        if new_offset < 0 {
            return Err(path_err(OP, &self.name, ErrorKind::Invalid));
        }
        state.offset = new_offset;
        Ok(new_offset)
    }

    /// Returns up to `n` directory entries in sorted order, resuming from
    /// wherever the previous call on this handle left off. `n <= 0` drains
    /// the whole remaining listing. Returns `Eof` once the cursor is
    /// exhausted and `n > 0` (mirrors `os.File.Readdir`'s contract).
    pub fn readdir(&self, n: i64) -> Result<Vec<FileInfo>, ReadError> {
        const OP: &str = "readdirent";
        let node = self.node_or_file_closing(OP).map_err(as_read_error)?;
        if !node.is_dir() {
            return Err(ReadError::Op(PathError { op: OP, path: self.name.clone(), err: ErrorKind::NotDir }));
        }
        let mut state = self.state.write().unwrap();
        if state.dir_cursor.is_none() {
            state.dir_cursor = Some(node.snapshot_names_sorted());
        }
        if n <= 0 {
            let names = state.dir_cursor.take().unwrap_or_default();
            return Ok(names.iter().map(|name| node.fill_stat_from(name)).collect());
        }
        let cursor = state.dir_cursor.as_mut().unwrap();
        if cursor.is_empty() {
            state.dir_cursor = None;
            return Err(ReadError::Eof);
        }
        let take = (n as usize).min(cursor.len());
        let names: Vec<String> = cursor.drain(..take).collect();
        Ok(names.iter().map(|name| node.fill_stat_from(name)).collect())
    }

    /// Name-only variant of [`OpenFile::readdir`].
    pub fn readdirnames(&self, n: i64) -> Result<Vec<String>, ReadError> {
        Ok(self.readdir(n)?.into_iter().map(|fi| fi.name).collect())
    }
}

fn as_read_error(e: Error) -> ReadError {
    match e {
        Error::Path(e) => ReadError::Op(e),
        Error::Link(_) => unreachable!("handle operations only ever build PathError"),
    }
}
