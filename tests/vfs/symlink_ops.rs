//! Symbolic links are out of scope for this core; every entry point in
//! this family must fail `permission-denied` rather than silently no-op.

use super::common::fresh;
use mamont_vfs::{Error, ErrorKind};

#[test]
fn symlink_is_permission_denied() {
    let vfs = fresh();
    let err = vfs.symlink("/a", "/b").unwrap_err();
    assert!(matches!(err, Error::Link(e) if e.err == ErrorKind::PermissionDenied));
}

#[test]
fn readlink_is_permission_denied() {
    let vfs = fresh();
    let err = vfs.readlink("/a").unwrap_err();
    assert!(matches!(err, Error::Path(e) if e.err == ErrorKind::PermissionDenied));
}

#[test]
fn eval_symlinks_is_permission_denied() {
    let vfs = fresh();
    let err = vfs.eval_symlinks("/a").unwrap_err();
    assert!(matches!(err, Error::Path(e) if e.err == ErrorKind::PermissionDenied));
}

#[test]
fn chown_family_is_permission_denied() {
    let vfs = fresh();
    vfs.write_file("/a", b"x").unwrap();
    assert!(matches!(
        vfs.chown("/a", 0, 0).unwrap_err(),
        Error::Path(e) if e.err == ErrorKind::PermissionDenied
    ));
    assert!(matches!(
        vfs.lchown("/a", 0, 0).unwrap_err(),
        Error::Path(e) if e.err == ErrorKind::PermissionDenied
    ));
}

#[test]
fn chroot_is_permission_denied() {
    let vfs = fresh();
    let err = vfs.chroot("/").unwrap_err();
    assert!(matches!(err, Error::Path(e) if e.err == ErrorKind::PermissionDenied));
}
