use super::common::fresh;
use mamont_vfs::OpenFlags;

#[test]
fn create_write_read_end_to_end() {
    let vfs = fresh();
    let f = vfs.create("/a").unwrap();
    f.write(b"hello").unwrap();
    f.close().unwrap();

    let f = vfs.open_file("/a", OpenFlags::RDONLY, 0).unwrap();
    assert_eq!(vfs.read_file("/a").unwrap(), b"hello");
    f.close().unwrap();
    assert_eq!(vfs.stat("/a").unwrap().size, 5);
}

#[test]
fn fresh_file_is_empty_after_create_close_reopen() {
    let vfs = fresh();
    vfs.create("/a").unwrap().close().unwrap();
    let f = vfs.open_file("/a", OpenFlags::RDONLY, 0).unwrap();
    let mut buf = [0u8; 8];
    assert!(matches!(f.read(&mut buf), Err(mamont_vfs::ReadError::Eof)));
}

#[test]
fn exclusive_create_rejects_existing_file() {
    let vfs = fresh();
    vfs.write_file("/a", b"x").unwrap();
    let err = vfs.open_file("/a", OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::EXCL, 0o644).unwrap_err();
    assert!(matches!(err, mamont_vfs::Error::Path(e) if e.err == mamont_vfs::ErrorKind::Exist));
}

#[test]
fn open_nonexistent_without_create_fails() {
    let vfs = fresh();
    let err = vfs.open_file("/missing", OpenFlags::RDONLY, 0).unwrap_err();
    assert!(matches!(err, mamont_vfs::Error::Path(e) if e.err == mamont_vfs::ErrorKind::NotExist));
}

#[test]
fn write_at_past_end_leaves_zero_hole() {
    let vfs = fresh();
    let f = vfs.create("/a").unwrap();
    f.write(b"ab").unwrap();
    f.write_at(5, b"cd").unwrap();
    f.close().unwrap();
    assert_eq!(vfs.read_file("/a").unwrap(), b"ab\0\0\0cd");
}
