//! The on-heap entity for a file or directory (spec.md §3, §4.2).
//!
//! Every [`Node`] owns its own `RwLock` guarding its mutable fields and is
//! shared via `Arc` between the path index, any parent's children map, and
//! any open handle that targets it — exactly the shared-ownership model
//! spec.md §9 calls for ("a reference-counted shared pointer matches the
//! semantics exactly").

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::fileinfo::{FileInfo, MODE_DIR, PERM_MASK};

/// Nanoseconds since the Unix epoch, used for `mtime`.
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[derive(Debug)]
struct Inner {
    mode: u32,
    mtime: i64,
    nlink: u32,
    /// `Some` only for files.
    data: Option<Vec<u8>>,
    /// `Some` only for directories.
    children: Option<BTreeMap<String, Arc<Node>>>,
}

/// A directory or regular file. Directory-ness is fixed at construction
/// (spec.md invariant 5: "a node's directory flag never changes").
#[derive(Debug)]
pub struct Node {
    is_dir: bool,
    inner: RwLock<Inner>,
}

impl Node {
    /// Creates a new file node with link count 1 and an empty buffer.
    pub fn new_file(mode: u32) -> Arc<Node> {
        let now = now_nanos();
        Arc::new(Node {
            is_dir: false,
            inner: RwLock::new(Inner {
                mode: mode & PERM_MASK,
                mtime: now,
                nlink: 1,
                data: Some(Vec::new()),
                children: None,
            }),
        })
    }

    /// Creates a new directory node with link count 1 and no children.
    pub fn new_dir(mode: u32) -> Arc<Node> {
        let now = now_nanos();
        Arc::new(Node {
            is_dir: true,
            inner: RwLock::new(Inner {
                mode: MODE_DIR | (mode & PERM_MASK),
                mtime: now,
                nlink: 1,
                data: None,
                children: Some(BTreeMap::new()),
            }),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn mode(&self) -> u32 {
        self.inner.read().unwrap().mode
    }

    pub fn mtime(&self) -> i64 {
        self.inner.read().unwrap().mtime
    }

    pub fn nlink(&self) -> u32 {
        self.inner.read().unwrap().nlink
    }

    /// Replaces the permission bits, preserving the directory flag.
    pub fn set_mode(&self, m: u32) {
        let mut inner = self.inner.write().unwrap();
        inner.mode = (m & PERM_MASK) | if self.is_dir { MODE_DIR } else { 0 };
    }

    pub fn set_mtime(&self, t: i64) {
        self.inner.write().unwrap().mtime = t;
    }

    fn touch(inner: &mut Inner) {
        inner.mtime = now_nanos();
    }

    /// Truncates a file's buffer to `n` bytes, releasing it entirely when
    /// `n == 0`. Has no effect on directories (never called for one by
    /// the VFS core, which rejects `truncate` on directories earlier).
    pub fn truncate(&self, n: u64) {
        let mut inner = self.inner.write().unwrap();
        if self.is_dir {
            return;
        }
        if n == 0 {
            inner.data = Some(Vec::new());
        } else if let Some(data) = inner.data.as_mut() {
            data.resize(n as usize, 0);
        } else {
            inner.data = Some(vec![0; n as usize]);
        }
        Self::touch(&mut inner);
    }

    /// Byte length for files, child count for directories.
    pub fn size(&self) -> u64 {
        let inner = self.inner.read().unwrap();
        if self.is_dir {
            inner.children.as_ref().map_or(0, |c| c.len() as u64)
        } else {
            inner.data.as_ref().map_or(0, |d| d.len() as u64)
        }
    }

    /// Inserts `child` under `name` if the name is not already taken.
    /// Returns `false` without modifying anything if `name` is occupied.
    pub fn add_child_if_absent(&self, name: &str, child: Arc<Node>) -> bool {
        let mut inner = self.inner.write().unwrap();
        let children = inner.children.get_or_insert_with(BTreeMap::new);
        if children.contains_key(name) {
            false
        } else {
            children.insert(name.to_string(), child);
            true
        }
    }

    /// Runs `f` with mutable access to this directory's children map while
    /// holding this node's write lock for the entire call. The VFS core
    /// uses this to fold a top-level path-index edit into the same
    /// critical section as the corresponding child-map edit (spec.md §5:
    /// "acquire per-node locks in a defined order and update both
    /// indices") — a reader taking either this node's lock or the
    /// top-level index lock blocks until both edits have landed, instead
    /// of observing one without the other.
    pub fn with_children_mut<R>(&self, f: impl FnOnce(&mut BTreeMap<String, Arc<Node>>) -> R) -> R {
        let mut inner = self.inner.write().unwrap();
        let children = inner.children.get_or_insert_with(BTreeMap::new);
        f(children)
    }

    /// Looks up a child by name without affecting any lock ordering
    /// concerns beyond this node's own read lock.
    pub fn child(&self, name: &str) -> Option<Arc<Node>> {
        let inner = self.inner.read().unwrap();
        inner.children.as_ref().and_then(|c| c.get(name).cloned())
    }

    /// Removes `name` from this directory's children and decrements the
    /// removed node's link count, releasing its content when the count
    /// reaches zero. This is the single entry point `remove` and
    /// `remove_all` use to destroy a directory entry, keeping the
    /// parent-then-child lock order spec.md §5 requires.
    pub fn remove_child_and_dec(&self, name: &str) -> Option<Arc<Node>> {
        let removed = {
            let mut inner = self.inner.write().unwrap();
            inner.children.as_mut().and_then(|c| c.remove(name))
        };
        if let Some(child) = &removed {
            child.dec_nlink_release();
        }
        removed
    }

    /// Decrements this node's link count, releasing its data/children
    /// when it reaches zero. Used directly by `rename` when a replaced
    /// node is not reachable through any directory's children map anymore.
    pub fn dec_nlink_release(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.nlink = inner.nlink.saturating_sub(1);
        if inner.nlink == 0 {
            inner.data = None;
            if self.is_dir {
                inner.children = Some(BTreeMap::new());
            }
        }
    }

    /// Increments this node's link count. Used by `link`.
    pub fn inc_nlink(&self) {
        self.inner.write().unwrap().nlink += 1;
    }

    /// Materializes a sorted snapshot of this directory's children as
    /// `FileInfo`. Sort order is lexicographic by name; names are unique
    /// within a directory so ties never occur.
    pub fn snapshot_children_sorted(&self) -> Vec<FileInfo> {
        let inner = self.inner.read().unwrap();
        match &inner.children {
            None => Vec::new(),
            Some(children) => {
                children.iter().map(|(name, node)| node.fill_stat_from(name)).collect()
            }
        }
    }

    /// Materializes a sorted snapshot of this directory's child names.
    pub fn snapshot_names_sorted(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        match &inner.children {
            None => Vec::new(),
            Some(children) => children.keys().cloned().collect(),
        }
    }

    /// Snapshots `(name, size, mode, mtime)` under a single read lock.
    pub fn fill_stat_from(&self, name: &str) -> FileInfo {
        let inner = self.inner.read().unwrap();
        let size = if self.is_dir {
            inner.children.as_ref().map_or(0, |c| c.len() as i64)
        } else {
            inner.data.as_ref().map_or(0, |d| d.len() as i64)
        };
        FileInfo { name: name.to_string(), size, mode: inner.mode, modtime: inner.mtime }
    }

    // --- file content access, used by OpenFile ---

    pub(crate) fn read_at(&self, off: u64, buf: &mut [u8]) -> usize {
        let inner = self.inner.read().unwrap();
        let data = inner.data.as_deref().unwrap_or(&[]);
        if off as usize >= data.len() {
            return 0;
        }
        let available = &data[off as usize..];
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        n
    }

    pub(crate) fn data_len(&self) -> u64 {
        self.size()
    }

    /// Overwrites `data[offset..]` and appends any remainder. Updates
    /// mtime. Returns the number of bytes written (always `buf.len()`).
    pub(crate) fn write_at_extending(&self, offset: u64, buf: &[u8]) -> usize {
        let mut inner = self.inner.write().unwrap();
        let data = inner.data.get_or_insert_with(Vec::new);
        let off = offset as usize;
        let end = off + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[off..end].copy_from_slice(buf);
        Self::touch(&mut inner);
        buf.len()
    }
}
