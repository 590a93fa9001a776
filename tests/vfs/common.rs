use mamont_vfs::{Vfs, VfsOptions};

pub fn fresh() -> Vfs {
    Vfs::new(VfsOptions::new())
}
