//! Real-thread exercises for the invariants in spec.md §5 and §8 — no
//! mocked scheduler, actual `std::thread`s racing on a shared [`Vfs`].

use super::common::fresh;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_writers_to_distinct_files_all_land() {
    let vfs = fresh();
    vfs.mkdir("/d", 0o755).unwrap();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let vfs = vfs.clone();
            thread::spawn(move || {
                let name = format!("/d/f{i}");
                vfs.write_file(&name, format!("{i}").as_bytes()).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let entries = vfs.read_dir("/d").unwrap();
    assert_eq!(entries.len(), 16);
}

#[test]
fn concurrent_mkdir_all_on_the_same_tree_converges_once() {
    let vfs = fresh();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let vfs = vfs.clone();
            thread::spawn(move || vfs.mkdir_all("/shared/nested/dir", 0o755))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }
    assert!(vfs.stat("/shared/nested/dir").unwrap().is_dir());
    assert_eq!(vfs.read_dir("/shared").unwrap().len(), 1);
}

#[test]
fn concurrent_links_to_one_file_keep_content_consistent() {
    let vfs = fresh();
    vfs.write_file("/src", b"shared").unwrap();
    let vfs = Arc::new(vfs);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let vfs = vfs.clone();
            thread::spawn(move || vfs.link("/src", &format!("/link{i}")).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    for i in 0..8 {
        assert_eq!(vfs.read_file(&format!("/link{i}")).unwrap(), b"shared");
    }
}
