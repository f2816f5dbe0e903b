mod entry;
mod map_fs;

pub use entry::{
    Entry, EntryType, PERMISSION_BITS, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT,
    S_IFREG, S_IFSOCK, Stat,
};
pub use map_fs::MapFS;
