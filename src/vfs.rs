//! The VFS core: the two indices, working directory, umask, and every
//! path-addressed operation from spec.md §4.3.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::error::{link_err, path_err, Error, ErrorKind, VfsResult};
use crate::fileinfo::{FileInfo, MODE_DIR, PERM_MASK, STANDARD_DIR_MODE};
use crate::flags::OpenFlags;
use crate::handle::OpenFile;
use crate::node::Node;
use crate::options::VfsOptions;
use crate::path;

#[cfg(unix)]
fn process_umask() -> u32 {
    // SAFETY: `umask(2)` has no failure mode; calling it twice in a row
    // with the previous value restores the process umask exactly.
    unsafe {
        let old = libc::umask(0o022);
        libc::umask(old);
        old as u32
    }
}

#[cfg(not(unix))]
fn process_umask() -> u32 {
    0o022
}

struct VfsInner {
    index: RwLock<HashMap<String, Arc<Node>>>,
    cwd: RwLock<String>,
    umask: AtomicU32,
}

/// An in-memory, POSIX-like virtual filesystem.
///
/// Cheap to clone: internally an `Arc`, so a clone shares state with its
/// origin the same way a second `File` descriptor shares an inode — this
/// is what lets an [`OpenFile`] hold its own `Vfs` handle back to the
/// filesystem it was opened from (e.g. to implement `chdir` on a handle).
#[derive(Clone)]
pub struct Vfs(Arc<VfsInner>);

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs").field("cwd", &self.cwd()).finish()
    }
}

impl Vfs {
    /// Creates a fresh filesystem containing only the root directory.
    pub fn new(options: VfsOptions) -> Vfs {
        let mut index = HashMap::new();
        index.insert("/".to_string(), Node::new_dir(STANDARD_DIR_MODE));
        let vfs = Vfs(Arc::new(VfsInner {
            index: RwLock::new(index),
            cwd: RwLock::new("/".to_string()),
            umask: AtomicU32::new(process_umask()),
        }));
        if options.precreate_standard_dirs {
            for dir in ["/home", "/root", "/tmp"] {
                vfs.mkdir_all(dir, STANDARD_DIR_MODE).expect("fresh filesystem cannot fail mkdir_all");
            }
        }
        vfs
    }

    pub fn umask(&self) -> u32 {
        self.0.umask.load(Ordering::SeqCst)
    }

    /// Sets the umask, returning the previous value (matches
    /// `syscall.Umask`'s return-previous-value convention).
    pub fn set_umask(&self, mask: u32) -> u32 {
        self.0.umask.swap(mask & PERM_MASK, Ordering::SeqCst)
    }

    pub fn cwd(&self) -> String {
        self.0.cwd.read().unwrap().clone()
    }

    fn abs(&self, p: &str) -> String {
        path::abs(p, &self.cwd())
    }

    fn lookup_node(&self, abs_p: &str) -> Option<Arc<Node>> {
        self.0.index.read().unwrap().get(abs_p).cloned()
    }

    fn exists(&self, abs_p: &str) -> bool {
        self.0.index.read().unwrap().contains_key(abs_p)
    }

    /// Walks `start` and its ancestors upward until one is found in the
    /// index (the root always is), and classifies the error accordingly:
    /// `NotDir` if the first existing ancestor is not a directory,
    /// `NotExist` otherwise (an intermediate component is missing).
    fn ancestor_error(&self, op: &'static str, display_path: &str, start: &str) -> Error {
        let index = self.0.index.read().unwrap();
        let mut cur = start.to_string();
        loop {
            if let Some(node) = index.get(&cur) {
                return if node.is_dir() {
                    path_err(op, display_path, ErrorKind::NotExist)
                } else {
                    path_err(op, display_path, ErrorKind::NotDir)
                };
            }
            if cur == "/" {
                return path_err(op, display_path, ErrorKind::NotExist);
            }
            cur = path::dir(&cur);
        }
    }

    fn created_mode(&self, perm: u32, dir_bit: u32) -> u32 {
        dir_bit | (perm & PERM_MASK & !self.umask())
    }

    // ---------------------------------------------------------------
    // Directory creation
    // ---------------------------------------------------------------

    pub fn mkdir(&self, name: &str, perm: u32) -> VfsResult<()> {
        const OP: &str = "mkdir";
        if name.is_empty() {
            return Err(path_err(OP, name, ErrorKind::NotExist));
        }
        let abs_p = self.abs(name);
        let (dir_p, leaf) = path::split(&abs_p);
        if self.exists(&abs_p) {
            return Err(path_err(OP, name, ErrorKind::Exist));
        }
        let parent = match self.lookup_node(&dir_p) {
            Some(n) => n,
            None => return Err(self.ancestor_error(OP, name, &dir_p)),
        };
        if !parent.is_dir() {
            return Err(path_err(OP, name, ErrorKind::NotDir));
        }
        let mode = self.created_mode(perm, MODE_DIR);
        let node = Node::new_dir(mode);
        // Both the parent's child-map edit and the path-index edit commit
        // inside one critical section (spec.md §5), so a concurrent
        // `stat(abs_p)` and a concurrent `read_dir(dir_p)` never disagree
        // about whether the directory exists yet.
        let mut exists = false;
        parent.with_children_mut(|children| {
            if children.contains_key(&leaf) {
                exists = true;
            } else {
                children.insert(leaf.clone(), node.clone());
                self.0.index.write().unwrap().insert(abs_p.clone(), node.clone());
            }
        });
        if exists {
            return Err(path_err(OP, name, ErrorKind::Exist));
        }
        debug!(op = OP, path = name, "created directory");
        Ok(())
    }

    pub fn mkdir_all(&self, p: &str, perm: u32) -> VfsResult<()> {
        const OP: &str = "mkdir";
        let abs_p = self.abs(p);
        let mut chain = Vec::new();
        let mut cur = abs_p.clone();
        loop {
            chain.push(cur.clone());
            if cur == "/" {
                break;
            }
            cur = path::dir(&cur);
        }
        chain.reverse();

        for component in &chain {
            if let Some(node) = self.lookup_node(component) {
                if !node.is_dir() {
                    return Err(path_err(OP, p, ErrorKind::NotDir));
                }
                continue;
            }
            let (dir_p, leaf) = path::split(component);
            let parent = self
                .lookup_node(&dir_p)
                .expect("ancestor was just created or is the root, which always exists");
            let mode = self.created_mode(perm, MODE_DIR);
            let node = Node::new_dir(mode);
            // Same one-critical-section discipline as `mkdir`: the
            // child-map insert and the path-index insert commit together.
            parent.with_children_mut(|children| {
                if !children.contains_key(&leaf) {
                    children.insert(leaf.clone(), node.clone());
                    self.0.index.write().unwrap().insert(component.clone(), node.clone());
                }
                // else: lost a race to a concurrent creator of the same
                // directory; treat that as success, matching mkdir -p.
            });
        }
        debug!(op = OP, path = p, "created directory tree");
        Ok(())
    }

    // ---------------------------------------------------------------
    // File creation and open
    // ---------------------------------------------------------------

    pub fn open_file(&self, name: &str, flags: OpenFlags, perm: u32) -> VfsResult<OpenFile> {
        const OP: &str = "open";
        let read = flags.contains(OpenFlags::RDONLY) || flags.contains(OpenFlags::RDWR);
        let write = flags.intersects(
            OpenFlags::APPEND | OpenFlags::CREATE | OpenFlags::RDWR | OpenFlags::TRUNC | OpenFlags::WRONLY,
        );

        let abs_p = self.abs(name);
        let (dir_p, leaf) = path::split(&abs_p);
        let existing = self.lookup_node(&abs_p);

        let node = match existing {
            Some(n) => {
                if n.is_dir() && write {
                    return Err(path_err(OP, name, ErrorKind::IsDir));
                }
                if flags.contains(OpenFlags::CREATE) && flags.contains(OpenFlags::EXCL) {
                    return Err(path_err(OP, name, ErrorKind::Exist));
                }
                n
            }
            None => {
                let parent = self.lookup_node(&dir_p);
                if parent.is_none() {
                    return Err(path_err(OP, name, ErrorKind::NotExist));
                }
                if !flags.contains(OpenFlags::CREATE) {
                    return Err(path_err(OP, name, ErrorKind::NotExist));
                }
                if !write {
                    return Err(path_err(OP, name, ErrorKind::PermissionDenied));
                }
                let parent = parent.unwrap();
                if !parent.is_dir() {
                    return Err(path_err(OP, name, ErrorKind::NotDir));
                }
                let mode = perm & PERM_MASK & !self.umask();
                let node = Node::new_file(mode);
                // Child-map insert and path-index insert commit together,
                // same as `mkdir` (spec.md §5).
                let mut created = false;
                parent.with_children_mut(|children| {
                    if !children.contains_key(&leaf) {
                        children.insert(leaf.clone(), node.clone());
                        self.0.index.write().unwrap().insert(abs_p.clone(), node.clone());
                        created = true;
                    }
                });
                if created {
                    debug!(op = OP, path = name, "created file");
                    node
                } else {
                    // Lost a race with a concurrent creator; open what's there now.
                    self.lookup_node(&abs_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?
                }
            }
        };

        if flags.contains(OpenFlags::TRUNC) && !node.is_dir() {
            node.truncate(0);
        }
        let offset = if flags.contains(OpenFlags::APPEND) { node.size() as i64 } else { 0 };
        Ok(OpenFile::new(self.clone(), name.to_string(), node, read, write, offset))
    }

    /// `open_file(name, RDWR|CREATE|TRUNC, 0o666)`.
    pub fn create(&self, name: &str) -> VfsResult<OpenFile> {
        self.open_file(name, OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::TRUNC, 0o666)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn stat(&self, p: &str) -> VfsResult<FileInfo> {
        self.stat_impl("stat", p)
    }

    /// Symbolic links are unimplemented, so `lstat` behaves exactly like
    /// `stat` in this core (spec.md §4.3).
    pub fn lstat(&self, p: &str) -> VfsResult<FileInfo> {
        self.stat_impl("lstat", p)
    }

    fn stat_impl(&self, op: &'static str, p: &str) -> VfsResult<FileInfo> {
        let abs_p = self.abs(p);
        if let Some(node) = self.lookup_node(&abs_p) {
            let leaf = if abs_p == "/" { "/".to_string() } else { path::base(&abs_p) };
            return Ok(node.fill_stat_from(&leaf));
        }
        Err(self.ancestor_error(op, p, &path::dir(&abs_p)))
    }

    pub fn read_dir(&self, dirname: &str) -> VfsResult<Vec<FileInfo>> {
        let handle = self.open_file(dirname, OpenFlags::RDONLY, 0)?;
        let entries = match handle.readdir(-1) {
            Ok(entries) => entries,
            Err(crate::error::ReadError::Eof) => Vec::new(),
            Err(crate::error::ReadError::Op(e)) => return Err(Error::Path(e)),
        };
        handle.close()?;
        Ok(entries)
    }

    pub fn read_file(&self, name: &str) -> VfsResult<Vec<u8>> {
        let handle = self.open_file(name, OpenFlags::RDONLY, 0)?;
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match handle.read(&mut buf) {
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(crate::error::ReadError::Eof) => break,
                Err(crate::error::ReadError::Op(e)) => return Err(Error::Path(e)),
            }
        }
        handle.close()?;
        Ok(out)
    }

    pub fn write_file(&self, name: &str, data: &[u8]) -> VfsResult<()> {
        let handle = self.create(name)?;
        handle.write(data)?;
        handle.close()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    pub fn chmod(&self, name: &str, mode: u32) -> VfsResult<()> {
        const OP: &str = "chmod";
        let abs_p = self.abs(name);
        let node = self.lookup_node(&abs_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?;
        node.set_mode(mode);
        Ok(())
    }

    /// Updates mtime only; atime is accepted but ignored per spec.md §4.3.
    pub fn chtimes(&self, name: &str, _atime: i64, mtime: i64) -> VfsResult<()> {
        const OP: &str = "chtimes";
        let abs_p = self.abs(name);
        let node = self.lookup_node(&abs_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?;
        node.set_mtime(mtime);
        Ok(())
    }

    pub fn truncate(&self, name: &str, size: u64) -> VfsResult<()> {
        const OP: &str = "truncate";
        let abs_p = self.abs(name);
        let node = self.lookup_node(&abs_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?;
        if node.is_dir() {
            return Err(path_err(OP, name, ErrorKind::IsDir));
        }
        node.truncate(size);
        Ok(())
    }

    pub fn chdir(&self, dir: &str) -> VfsResult<()> {
        const OP: &str = "chdir";
        let abs_p = self.abs(dir);
        match self.lookup_node(&abs_p) {
            Some(n) if n.is_dir() => {
                *self.0.cwd.write().unwrap() = abs_p;
                Ok(())
            }
            Some(_) => Err(path_err(OP, dir, ErrorKind::NotDir)),
            None => Err(path_err(OP, dir, ErrorKind::NotExist)),
        }
    }

    // --- unimplemented collaborators: identity/permissions/symlinks ---

    pub fn chown(&self, name: &str, _uid: i64, _gid: i64) -> VfsResult<()> {
        Err(path_err("chown", name, ErrorKind::PermissionDenied))
    }

    pub fn lchown(&self, name: &str, _uid: i64, _gid: i64) -> VfsResult<()> {
        Err(path_err("lchown", name, ErrorKind::PermissionDenied))
    }

    pub fn chroot(&self, dir: &str) -> VfsResult<()> {
        Err(path_err("chroot", dir, ErrorKind::PermissionDenied))
    }

    pub fn symlink(&self, old: &str, new: &str) -> VfsResult<()> {
        Err(link_err("symlink", old, new, ErrorKind::PermissionDenied))
    }

    pub fn readlink(&self, name: &str) -> VfsResult<String> {
        Err(path_err("readlink", name, ErrorKind::PermissionDenied))
    }

    pub fn eval_symlinks(&self, name: &str) -> VfsResult<String> {
        Err(path_err("lstat", name, ErrorKind::PermissionDenied))
    }

    // ---------------------------------------------------------------
    // Hard link
    // ---------------------------------------------------------------

    pub fn link(&self, old: &str, new: &str) -> VfsResult<()> {
        const OP: &str = "link";
        let abs_old = self.abs(old);
        let abs_new = self.abs(new);
        let (new_dir, new_leaf) = path::split(&abs_new);

        let old_node = self.lookup_node(&abs_old);
        let new_parent = self.lookup_node(&new_dir);

        let old_node = old_node.ok_or_else(|| link_err(OP, old, new, ErrorKind::NotExist))?;
        let new_parent = new_parent.ok_or_else(|| link_err(OP, old, new, ErrorKind::NotExist))?;

        if old_node.is_dir() {
            return Err(link_err(OP, old, new, ErrorKind::NotPermitted));
        }
        if self.exists(&abs_new) {
            return Err(link_err(OP, old, new, ErrorKind::Exist));
        }

        // Lock ordering per spec.md §5: source (child) before destination
        // parent. The destination's child-map insert and the path-index
        // insert commit inside one critical section, same discipline as
        // `mkdir`.
        old_node.inc_nlink();
        let mut exists = false;
        new_parent.with_children_mut(|children| {
            if children.contains_key(&new_leaf) {
                exists = true;
            } else {
                children.insert(new_leaf.clone(), old_node.clone());
                self.0.index.write().unwrap().insert(abs_new.clone(), old_node.clone());
            }
        });
        if exists {
            old_node.dec_nlink_release();
            return Err(link_err(OP, old, new, ErrorKind::Exist));
        }
        debug!(op = OP, old = old, new = new, "created hard link");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Rename
    // ---------------------------------------------------------------

    pub fn rename(&self, old: &str, new: &str) -> VfsResult<()> {
        const OP: &str = "rename";
        let abs_old = self.abs(old);
        let abs_new = self.abs(new);
        if abs_old == abs_new {
            return Ok(());
        }
        if abs_old == "/" || abs_new == "/" {
            return Err(link_err(OP, old, new, ErrorKind::NotPermitted));
        }

        let (old_dir, old_leaf) = path::split(&abs_old);
        let (new_dir, new_leaf) = path::split(&abs_new);

        let node = self.lookup_node(&abs_old).ok_or_else(|| link_err(OP, old, new, ErrorKind::NotExist))?;
        let old_parent =
            self.lookup_node(&old_dir).ok_or_else(|| link_err(OP, old, new, ErrorKind::NotExist))?;
        let new_parent =
            self.lookup_node(&new_dir).ok_or_else(|| link_err(OP, old, new, ErrorKind::NotExist))?;
        let existing_new = self.lookup_node(&abs_new);

        if let Some(existing) = &existing_new {
            if node.is_dir() {
                return Err(link_err(OP, old, new, ErrorKind::Exist));
            }
            if existing.is_dir() {
                return Err(link_err(OP, old, new, ErrorKind::IsDir));
            }
        }

        // Lock ordering per spec.md §5: new parent, then old parent (if
        // distinct). Both parents' child-map edits and the path-index
        // edit (including the subtree reindex) commit inside one critical
        // section formed by the still-held node lock(s), so a reader
        // going through either parent's children or through the
        // top-level index never observes one edit without the other.
        let replaced = if Arc::ptr_eq(&old_parent, &new_parent) {
            new_parent.with_children_mut(|children| {
                children.remove(&old_leaf);
                let replaced = children.insert(new_leaf.clone(), node.clone());
                self.commit_rename_index(&abs_old, &abs_new, &node);
                replaced
            })
        } else {
            new_parent.with_children_mut(|new_children| {
                let replaced = new_children.insert(new_leaf.clone(), node.clone());
                old_parent.with_children_mut(|old_children| {
                    old_children.remove(&old_leaf);
                    self.commit_rename_index(&abs_old, &abs_new, &node);
                });
                replaced
            })
        };

        if let Some(replaced) = replaced {
            // Open Question (spec.md §9) resolved: decrement the replaced
            // node's link count instead of leaking it. This also covers
            // renaming onto one of the moved node's own hard-link aliases
            // (`replaced` and `node` are the same `Arc`): exactly one
            // path-index entry for that node (`old`) disappeared, so its
            // nlink still drops by one even though the node survives
            // under `new` (invariant 2).
            replaced.dec_nlink_release();
        }

        debug!(op = OP, old = old, new = new, "renamed");
        Ok(())
    }

    /// Removes `abs_old` from the path index and inserts `abs_new`,
    /// reindexing every descendant when `node` is a directory. Called
    /// while `rename` still holds the relevant parent(s)' child-map
    /// lock(s), so this index edit and the corresponding child-map edits
    /// land inside the same critical section.
    fn commit_rename_index(&self, abs_old: &str, abs_new: &str, node: &Arc<Node>) {
        let mut idx = self.0.index.write().unwrap();
        idx.remove(abs_old);
        if node.is_dir() {
            trace!(op = "rename", old = abs_old, new = abs_new, "reindexing renamed subtree");
            let prefix = format!("{}/", abs_old);
            let updates: Vec<(String, Arc<Node>)> = idx
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (old_key, n) in updates {
                idx.remove(&old_key);
                let suffix = &old_key[abs_old.len()..];
                idx.insert(format!("{}{}", abs_new, suffix), n);
            }
        }
        idx.insert(abs_new.to_string(), node.clone());
    }

    // ---------------------------------------------------------------
    // Unlink
    // ---------------------------------------------------------------

    pub fn remove(&self, name: &str) -> VfsResult<()> {
        const OP: &str = "remove";
        let abs_p = self.abs(name);
        if abs_p == "/" {
            return Err(path_err(OP, name, ErrorKind::NotPermitted));
        }
        let (dir_p, leaf) = path::split(&abs_p);
        let node = self.lookup_node(&abs_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?;
        let parent = self.lookup_node(&dir_p).ok_or_else(|| path_err(OP, name, ErrorKind::NotExist))?;
        if node.is_dir() && node.size() > 0 {
            return Err(path_err(OP, name, ErrorKind::NotEmpty));
        }
        // The child-map removal and the path-index removal commit inside
        // one critical section (spec.md §5), so a reader cannot observe
        // the entry gone from one index but still present in the other.
        let mut removed = None;
        parent.with_children_mut(|children| {
            removed = children.remove(&leaf);
            if removed.is_some() {
                self.0.index.write().unwrap().remove(&abs_p);
            }
        });
        if let Some(child) = &removed {
            child.dec_nlink_release();
        }
        debug!(op = OP, path = name, "removed");
        Ok(())
    }

    pub fn remove_all(&self, p: &str) -> VfsResult<()> {
        const OP: &str = "remove";
        if p.is_empty() {
            return Ok(());
        }
        let abs_p = self.abs(p);
        if !self.exists(&abs_p) {
            return Ok(());
        }
        if abs_p == "/" {
            return Err(path_err(OP, p, ErrorKind::NotPermitted));
        }
        let (dir_p, leaf) = path::split(&abs_p);
        let parent = match self.lookup_node(&dir_p) {
            Some(n) => n,
            None => return Ok(()),
        };

        self.purge_descendants(&abs_p);
        // Same one-critical-section discipline as `remove` for the top
        // entry's own child-map and path-index edit; the recursive
        // descent above stays best-effort per spec.md §5.
        let mut removed = None;
        parent.with_children_mut(|children| {
            removed = children.remove(&leaf);
            if removed.is_some() {
                self.0.index.write().unwrap().remove(&abs_p);
            }
        });
        if let Some(child) = &removed {
            child.dec_nlink_release();
        }
        debug!(op = OP, path = p, "removed subtree");
        Ok(())
    }

    /// Recursively decrements the link count of every descendant of
    /// `root` and drops their path-index entries, leaving `root` itself
    /// indexed and attached to its parent for the caller to detach.
    /// Best-effort: concurrent lookups may observe a partially removed
    /// subtree, per spec.md §5.
    fn purge_descendants(&self, root: &str) {
        if let Some(node) = self.lookup_node(root) {
            if node.is_dir() {
                for name in node.snapshot_names_sorted() {
                    let child_path =
                        if root == "/" { format!("/{}", name) } else { format!("{}/{}", root, name) };
                    if let Some(child) = node.child(&name) {
                        if child.is_dir() {
                            self.purge_descendants(&child_path);
                        }
                        child.dec_nlink_release();
                    }
                }
            }
        }
        let prefix = format!("{}/", root);
        let mut idx = self.0.index.write().unwrap();
        let victims: Vec<String> = idx.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
        for v in victims {
            idx.remove(&v);
        }
    }
}

impl path::DirLister for Vfs {
    fn list(&self, dir: &str) -> Option<Vec<String>> {
        let node = self.lookup_node(&self.abs(dir))?;
        if !node.is_dir() {
            return None;
        }
        Some(node.snapshot_names_sorted())
    }
}
