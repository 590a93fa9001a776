use super::common::fresh;

#[test]
fn mkdir_all_twice_is_a_no_op_success() {
    let vfs = fresh();
    vfs.mkdir_all("/a/b/c", 0o755).unwrap();
    vfs.mkdir_all("/a/b/c", 0o755).unwrap();
    assert!(vfs.stat("/a/b/c").unwrap().is_dir());
}

#[test]
fn mkdir_rejects_missing_parent() {
    let vfs = fresh();
    let err = vfs.mkdir("/a/b", 0o755).unwrap_err();
    assert!(matches!(err, mamont_vfs::Error::Path(e) if e.err == mamont_vfs::ErrorKind::NotExist));
}

#[test]
fn mkdir_rejects_duplicate() {
    let vfs = fresh();
    vfs.mkdir("/a", 0o755).unwrap();
    let err = vfs.mkdir("/a", 0o755).unwrap_err();
    assert!(matches!(err, mamont_vfs::Error::Path(e) if e.err == mamont_vfs::ErrorKind::Exist));
}

#[test]
fn readdir_resumable_across_calls() {
    let vfs = fresh();
    vfs.mkdir("/e", 0o755).unwrap();
    vfs.write_file("/e/a", b"").unwrap();
    vfs.write_file("/e/b", b"").unwrap();
    vfs.write_file("/e/c", b"").unwrap();

    let handle = vfs.open_file("/e", mamont_vfs::OpenFlags::RDONLY, 0).unwrap();
    let names = |entries: Vec<mamont_vfs::FileInfo>| entries.into_iter().map(|e| e.name).collect::<Vec<_>>();

    assert_eq!(names(handle.readdir(2).unwrap()), vec!["a", "b"]);
    assert_eq!(names(handle.readdir(2).unwrap()), vec!["c"]);
    assert!(matches!(handle.readdir(2), Err(mamont_vfs::ReadError::Eof)));

    let fresh_handle = vfs.open_file("/e", mamont_vfs::OpenFlags::RDONLY, 0).unwrap();
    assert_eq!(names(fresh_handle.readdir(-1).unwrap()), vec!["a", "b", "c"]);
}

#[test]
fn read_dir_on_convenience_path_matches_children() {
    let vfs = fresh();
    vfs.mkdir("/e", 0o755).unwrap();
    vfs.write_file("/e/z", b"").unwrap();
    vfs.write_file("/e/a", b"").unwrap();
    let entries = vfs.read_dir("/e").unwrap();
    assert_eq!(entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>(), vec!["a", "z"]);
}
