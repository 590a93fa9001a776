use super::common::fresh;
use mamont_vfs::{Error, ErrorKind};

#[test]
fn remove_nonempty_directory_is_rejected() {
    let vfs = fresh();
    vfs.mkdir("/d", 0o755).unwrap();
    vfs.create("/d/f").unwrap().close().unwrap();

    let err = vfs.remove("/d").unwrap_err();
    assert!(matches!(
        err,
        Error::Path(e) if e.op == "remove" && e.path == "/d" && e.err == ErrorKind::NotEmpty
    ));
    assert!(vfs.stat("/d").is_ok());
}

#[test]
fn open_after_unlink_via_hard_link_preserves_content_and_link_count() {
    let vfs = fresh();
    vfs.write_file("/f", b"ok").unwrap();
    vfs.link("/f", "/g").unwrap();
    vfs.remove("/f").unwrap();
    assert_eq!(vfs.read_file("/g").unwrap(), b"ok");
    assert_eq!(vfs.stat("/g").unwrap().size, 2);
}

#[test]
fn remove_all_on_absent_path_succeeds_with_no_state_change() {
    let vfs = fresh();
    vfs.remove_all("/never/existed").unwrap();
}

#[test]
fn remove_all_recursively_drops_every_descendant() {
    let vfs = fresh();
    vfs.mkdir_all("/a/b/c", 0o755).unwrap();
    vfs.write_file("/a/b/f1", b"1").unwrap();
    vfs.write_file("/a/b/c/f2", b"2").unwrap();

    vfs.remove_all("/a").unwrap();

    assert!(vfs.stat("/a").is_err());
    assert!(vfs.stat("/a/b").is_err());
    assert!(vfs.stat("/a/b/c").is_err());
    assert!(vfs.stat("/a/b/f1").is_err());
    assert!(vfs.stat("/a/b/c/f2").is_err());
}

#[test]
fn remove_root_is_not_permitted() {
    let vfs = fresh();
    let err = vfs.remove("/").unwrap_err();
    assert!(matches!(err, Error::Path(e) if e.err == ErrorKind::NotPermitted));
}
