use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{FsBackend, SharedFs};
use crate::error::PathError;
use crate::flavour::PathFlavour;
use crate::path::{FakePath, PurePath};

/// Binds a store to the path flavour derived from its configuration.
///
/// All paths made by one `FakePathlib` share the store and parse with the same rules.
/// The flavour is read once, when the `FakePathlib` is created.
///
/// ```
/// use vfs_pathlib::{FakePathlib, MapFS};
///
/// let pathlib = FakePathlib::from_backend(MapFS::new());
/// let file = pathlib.path(["/tmp.txt"]);
/// file.write_bytes(b"data").unwrap();
/// assert!(file.is_file().unwrap());
/// ```
pub struct FakePathlib<B: FsBackend> {
    fs: SharedFs<B>,
    flavour: PathFlavour,
}

impl<B: FsBackend> FakePathlib<B> {
    pub fn new(fs: SharedFs<B>) -> Self {
        let flavour = PathFlavour::new(fs.borrow().config());
        Self { fs, flavour }
    }

    pub fn from_backend(backend: B) -> Self {
        Self::new(Rc::new(RefCell::new(backend)))
    }

    pub fn fs(&self) -> &SharedFs<B> {
        &self.fs
    }

    pub fn flavour(&self) -> PathFlavour {
        self.flavour
    }

    /// A store-bound path joined from `segments`.
    pub fn path<I, S>(&self, segments: I) -> FakePath<B>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        FakePath::new(Rc::clone(&self.fs), self.pure_path(segments))
    }

    /// A pure path with the store's flavour.
    pub fn pure_path<I, S>(&self, segments: I) -> PurePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PurePath::new(self.flavour, segments)
    }

    pub fn pure_posix_path<I, S>(&self, segments: I) -> PurePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PurePath::new(PathFlavour::posix(), segments)
    }

    pub fn pure_windows_path<I, S>(&self, segments: I) -> PurePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PurePath::new(PathFlavour::windows(), segments)
    }

    /// The store's current working directory.
    pub fn cwd(&self) -> FakePath<B> {
        let cwd = self.fs.borrow().cwd().to_string();
        self.path([cwd])
    }

    /// The home directory of the current user, taken from the real environment.
    pub fn home(&self) -> Result<FakePath<B>, PathError> {
        let home = self.flavour.home_directory(None)?;
        Ok(self.path([home]))
    }
}

impl<B: FsBackend> Clone for FakePathlib<B> {
    fn clone(&self) -> Self {
        Self {
            fs: Rc::clone(&self.fs),
            flavour: self.flavour,
        }
    }
}
