use super::common::fresh;
use mamont_vfs::{Error, ErrorKind};

#[test]
fn rename_directory_with_descendants_reindexes_every_path() {
    let vfs = fresh();
    vfs.mkdir_all("/a/b", 0o755).unwrap();
    vfs.write_file("/a/b/f", b"z").unwrap();

    vfs.rename("/a", "/c").unwrap();

    assert!(matches!(vfs.stat("/a").unwrap_err(), Error::Path(e) if e.err == ErrorKind::NotExist));
    assert!(matches!(vfs.stat("/a/b").unwrap_err(), Error::Path(e) if e.err == ErrorKind::NotExist));
    assert_eq!(vfs.read_file("/c/b/f").unwrap(), b"z");
    assert!(vfs.stat("/c").unwrap().is_dir());
    assert!(vfs.stat("/c/b").unwrap().is_dir());
}

#[test]
fn rename_same_canonical_path_is_a_no_op_success() {
    let vfs = fresh();
    vfs.mkdir("/x", 0o755).unwrap();
    vfs.rename("/x", "/x").unwrap();
    vfs.rename("/x", "/./x").unwrap();
    assert!(vfs.stat("/x").unwrap().is_dir());
}

#[test]
fn rename_over_existing_file_replaces_and_releases_it() {
    let vfs = fresh();
    vfs.write_file("/a", b"aaa").unwrap();
    vfs.write_file("/b", b"bbb").unwrap();
    vfs.rename("/a", "/b").unwrap();
    assert_eq!(vfs.read_file("/b").unwrap(), b"aaa");
    assert!(vfs.stat("/a").is_err());
}

#[test]
fn rename_directory_onto_file_is_rejected() {
    let vfs = fresh();
    vfs.mkdir("/d", 0o755).unwrap();
    vfs.write_file("/f", b"x").unwrap();
    let err = vfs.rename("/d", "/f").unwrap_err();
    assert!(matches!(err, Error::Link(e) if e.err == ErrorKind::Exist));
}

#[test]
fn rename_file_onto_directory_is_rejected() {
    let vfs = fresh();
    vfs.mkdir("/d", 0o755).unwrap();
    vfs.write_file("/f", b"x").unwrap();
    let err = vfs.rename("/f", "/d").unwrap_err();
    assert!(matches!(err, Error::Link(e) if e.err == ErrorKind::IsDir));
}
