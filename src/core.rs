use std::cell::RefCell;
use std::rc::Rc;

use crate::config::FsConfig;
use crate::error::FsError;
use crate::vfs::{Entry, Stat};

pub type FsResult<T> = std::result::Result<T, FsError>;

/// A store shared between all path values created for it.
pub type SharedFs<B> = Rc<RefCell<B>>;

/// The filesystem store consumed by path values.
///
/// Paths are passed as strings in the store's own flavour; relative paths are
/// resolved against [`cwd`](FsBackend::cwd).
pub trait FsBackend {
    /// Settings the path flavour is built from.
    fn config(&self) -> &FsConfig;

    /// Current working directory, always absolute.
    fn cwd(&self) -> &str;

    fn cd(&mut self, path: &str) -> FsResult<()>;

    /// Looks up the entry at `path`, following every symlink.
    fn resolve(&self, path: &str) -> FsResult<&Entry>;

    /// Like `resolve`, but a final symlink is returned itself.
    fn lresolve(&self, path: &str) -> FsResult<&Entry>;

    /// Canonical absolute form of `path` with all symlinks followed.
    /// `None` means the store has no symlink semantics to offer.
    fn canonicalize(&self, _path: &str) -> FsResult<Option<String>> {
        Ok(None)
    }

    fn stat(&self, path: &str) -> FsResult<Stat> {
        self.resolve(path).map(Entry::stat)
    }

    fn lstat(&self, path: &str) -> FsResult<Stat> {
        self.lresolve(path).map(Entry::stat)
    }

    /// Returns true if `path` resolves to an entry; a dangling symlink does not.
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Names of the immediate children of a directory.
    fn ls(&self, path: &str) -> FsResult<Vec<String>>;

    /// Creates a single directory; the parent must exist.
    fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()>;

    /// Creates an empty file; fails if anything exists at `path`.
    fn mkfile(&mut self, path: &str, mode: u32) -> FsResult<()>;

    /// Creates a symlink at `path` pointing to `target`.
    fn symlink(&mut self, path: &str, target: &str) -> FsResult<()>;

    fn read(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Replaces the content of a file, creating it if needed.
    fn write(&mut self, path: &str, content: &[u8]) -> FsResult<()>;

    /// Removes a file, a symlink or an empty directory.
    fn rm(&mut self, path: &str) -> FsResult<()>;

    /// Moves an entry. With `overwrite` an existing destination is always replaced;
    /// without it the store decides.
    fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> FsResult<()>;

    fn chmod(&mut self, path: &str, mode: u32, follow_symlinks: bool) -> FsResult<()>;

    /// Sets the modification time to now.
    fn utime(&mut self, path: &str) -> FsResult<()>;
}
