//! An in-memory filesystem with `pathlib`-style path values, for isolating tests from the disk.
//!
//! ### Overview
//!
//! `vfs-pathlib` parses paths the way POSIX or drive-letter systems do and resolves them
//! against a pluggable in-memory store instead of the real filesystem.
//!
//! **Key ideas**:
//! - **Flavours**: [`PathFlavour`] captures separator, alternative separator, drive-letter
//!   support and case sensitivity; all parsing rules (UNC shares, `//` roots, drive
//!   overrides, reserved names) are selected by these fields.
//! - **Pure values**: [`PurePath`] answers structural questions (`name`, `suffix`,
//!   `parents`, `relative_to`, `matches`) without touching any store.
//! - **Store-bound values**: [`FakePath`] adds `stat`, `exists`, `resolve`, `mkdir`,
//!   `rename`, `open` and friends on top of a shared [`FsBackend`].
//! - **Reference store**: [`MapFS`] keeps directories, files, symlinks and special files
//!   in a `BTreeMap` and follows the rules of its [`FsConfig`].
//!
//! ```
//! use vfs_pathlib::{FakePathlib, FsConfig, MapFS, TextOptions};
//!
//! let pathlib = FakePathlib::from_backend(MapFS::with_config(FsConfig::windows()));
//! let docs = pathlib.path(["C:/Users/Docs"]);
//! docs.mkdir(0o777, true, false).unwrap();
//!
//! let note = &docs / "note.txt";
//! note.write_text("hello", TextOptions::new()).unwrap();
//! assert_eq!(note.to_string(), "C:\\Users\\Docs\\note.txt");
//! assert!(pathlib.path(["c:/users/docs/NOTE.TXT"]).is_file().unwrap());
//! ```

mod config;
mod core;
mod error;
mod flavour;
mod fnmatch;
mod path;
mod stream;
mod vfs;

pub use config::FsConfig;
pub use crate::core::{FsBackend, FsResult, SharedFs};
pub use error::{FsError, PathError};
pub use flavour::{ParsedPath, PathFlavour};
pub use fnmatch::WildcardPattern;
pub use path::{FakePath, FakePathlib, Parents, PathScope, PurePath};
pub use stream::{FileHandle, OpenKind, OpenMode, TextOptions};
pub use vfs::{
    Entry, EntryType, MapFS, PERMISSION_BITS, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT,
    S_IFREG, S_IFSOCK, Stat,
};
