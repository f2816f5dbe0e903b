use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::ops::{Deref, Div};
use std::rc::Rc;

use tracing::trace;

use crate::core::{FsBackend, SharedFs};
use crate::error::{FsError, PathError};
use crate::path::PurePath;
use crate::stream::{FileHandle, TextOptions, line_separator};
use crate::vfs::{EntryType, Stat};

/// A path bound to a shared store.
///
/// Structural accessors come from [`PurePath`] through `Deref`. Methods that consult the
/// store fail with [`PathError::Closed`] once the path has been closed, either with
/// [`close`](FakePath::close) or by dropping the guard returned by
/// [`enter`](FakePath::enter).
pub struct FakePath<B: FsBackend> {
    pure: PurePath,
    fs: SharedFs<B>,
    closed: Cell<bool>,
}

/// Keeps a path open for a scope and closes it when dropped.
pub struct PathScope<'a, B: FsBackend> {
    path: &'a FakePath<B>,
}

impl<B: FsBackend> Deref for PathScope<'_, B> {
    type Target = FakePath<B>;

    fn deref(&self) -> &FakePath<B> {
        self.path
    }
}

impl<B: FsBackend> Drop for PathScope<'_, B> {
    fn drop(&mut self) {
        self.path.close();
    }
}

impl<B: FsBackend> FakePath<B> {
    pub fn new(fs: SharedFs<B>, pure: PurePath) -> Self {
        Self {
            pure,
            fs,
            closed: Cell::new(false),
        }
    }

    /// A new open path on the same store.
    fn derive(&self, pure: PurePath) -> Self {
        Self::new(Rc::clone(&self.fs), pure)
    }

    fn derive_str(&self, path: &str) -> Self {
        self.derive(PurePath::new(self.pure.flavour(), [path]))
    }

    pub fn pure(&self) -> &PurePath {
        &self.pure
    }

    pub fn fs(&self) -> &SharedFs<B> {
        &self.fs
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn close(&self) {
        self.closed.set(true);
    }

    /// Opens a scope; the path is closed when the returned guard is dropped.
    pub fn enter(&self) -> Result<PathScope<'_, B>, PathError> {
        self.check_open()?;
        Ok(PathScope { path: self })
    }

    fn check_open(&self) -> Result<(), PathError> {
        if self.closed.get() {
            return Err(PathError::Closed);
        }
        Ok(())
    }

    fn store_path(&self) -> &str {
        self.pure.as_ref()
    }

    // Derivations

    pub fn parent(&self) -> Self {
        self.derive(self.pure.parent())
    }

    pub fn parents(&self) -> impl Iterator<Item = Self> + '_ {
        self.pure.parents().iter().map(|parent| self.derive(parent))
    }

    pub fn joinpath<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.derive(self.pure.joinpath(segments))
    }

    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        self.derive(self.pure.join(segment))
    }

    pub fn with_name(&self, name: &str) -> Result<Self, PathError> {
        Ok(self.derive(self.pure.with_name(name)?))
    }

    pub fn with_stem(&self, stem: &str) -> Result<Self, PathError> {
        Ok(self.derive(self.pure.with_stem(stem)?))
    }

    pub fn with_suffix(&self, suffix: &str) -> Result<Self, PathError> {
        Ok(self.derive(self.pure.with_suffix(suffix)?))
    }

    pub fn relative_to(&self, other: impl AsRef<str>) -> Result<Self, PathError> {
        Ok(self.derive(self.pure.relative_to(other)?))
    }

    /// Replaces a leading `~` or `~user` with the home directory from the real
    /// environment.
    pub fn expanduser(&self) -> Result<Self, PathError> {
        let names = self.pure.parts();
        let expandable = self.pure.anchor().is_empty()
            && names.first().is_some_and(|first| first.starts_with('~'));
        if !expandable {
            return Ok(self.derive(self.pure.clone()));
        }
        let user = &names[0][1..];
        let home = self
            .pure
            .flavour()
            .home_directory((!user.is_empty()).then_some(user))?;
        let segments = std::iter::once(home.as_str()).chain(names[1..].iter().map(String::as_str));
        Ok(self.derive(PurePath::new(self.pure.flavour(), segments)))
    }

    // Store queries

    pub fn stat(&self) -> Result<Stat, PathError> {
        self.check_open()?;
        Ok(self.fs.borrow().stat(self.store_path())?)
    }

    /// Like [`stat`](FakePath::stat), but a final symlink is not followed.
    pub fn lstat(&self) -> Result<Stat, PathError> {
        self.check_open()?;
        Ok(self.fs.borrow().lstat(self.store_path())?)
    }

    pub fn exists(&self) -> Result<bool, PathError> {
        self.check_open()?;
        Ok(self.fs.borrow().exists(self.store_path()))
    }

    fn is_type(&self, entry_type: EntryType, follow_symlinks: bool) -> Result<bool, PathError> {
        self.check_open()?;
        let fs = self.fs.borrow();
        let entry = if follow_symlinks {
            fs.resolve(self.store_path())
        } else {
            fs.lresolve(self.store_path())
        };
        Ok(entry.is_ok_and(|entry| entry.entry_type() == entry_type))
    }

    pub fn is_dir(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::Directory, true)
    }

    /// True for regular files and for symlinks pointing to one.
    pub fn is_file(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::File, true)
    }

    pub fn is_symlink(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::Symlink, false)
    }

    pub fn is_block_device(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::BlockDevice, true)
    }

    pub fn is_char_device(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::CharDevice, true)
    }

    pub fn is_fifo(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::Fifo, true)
    }

    pub fn is_socket(&self) -> Result<bool, PathError> {
        self.is_type(EntryType::Socket, true)
    }

    /// Compares inode and device with `other`, a path value or a string.
    pub fn samefile(&self, other: impl AsRef<str>) -> Result<bool, PathError> {
        let stat = self.stat()?;
        let other = self.fs.borrow().stat(other.as_ref())?;
        Ok(stat.ino == other.ino && stat.dev == other.dev)
    }

    /// The target of a symlink.
    pub fn readlink(&self) -> Result<Self, PathError> {
        self.check_open()?;
        let fs = self.fs.borrow();
        let entry = fs.lresolve(self.store_path())?;
        match entry.target() {
            Some(target) => Ok(self.derive_str(target)),
            None => Err(FsError::InvalidPath(format!("not a symlink: {}", self.pure)).into()),
        }
    }

    /// Entries of this directory, joined onto this path.
    pub fn iterdir(&self) -> Result<Vec<Self>, PathError> {
        self.check_open()?;
        let names = self.fs.borrow().ls(self.store_path())?;
        Ok(names
            .into_iter()
            .filter(|name| name != "." && name != "..")
            .map(|name| self.join(name))
            .collect())
    }

    /// This path made absolute against the store's working directory.
    /// Symlinks and `..` are left alone.
    pub fn absolute(&self) -> Result<Self, PathError> {
        self.check_open()?;
        if self.pure.is_absolute() {
            return Ok(self.derive(self.pure.clone()));
        }
        let cwd = self.fs.borrow().cwd().to_string();
        Ok(self.derive(PurePath::new(self.pure.flavour(), [cwd.as_str(), self.store_path()])))
    }

    /// Makes the path absolute and follows all symlinks.
    ///
    /// Without `strict` a missing tail is kept as is; with it the result must exist.
    pub fn resolve(&self, strict: bool) -> Result<Self, PathError> {
        self.check_open()?;
        let canonical = self.fs.borrow().canonicalize(self.store_path())?;
        let resolved = match canonical {
            Some(path) => {
                if strict {
                    self.fs.borrow().stat(&path)?;
                }
                path
            }
            None => {
                trace!(path = %self.pure, "store has no canonical form, normalizing lexically");
                self.stat()?;
                self.absolute()?.to_string()
            }
        };
        let collapsed = self.pure.flavour().collapse(&resolved);
        Ok(self.derive_str(&collapsed))
    }

    // Store mutations

    pub fn chmod(&self, mode: u32) -> Result<(), PathError> {
        self.check_open()?;
        Ok(self.fs.borrow_mut().chmod(self.store_path(), mode, true)?)
    }

    /// Like [`chmod`](FakePath::chmod), but changes a symlink itself.
    pub fn lchmod(&self, mode: u32) -> Result<(), PathError> {
        self.check_open()?;
        Ok(self.fs.borrow_mut().chmod(self.store_path(), mode, false)?)
    }

    /// Creates this directory. `parents` creates missing ancestors, `exist_ok` accepts an
    /// existing directory.
    pub fn mkdir(&self, mode: u32, parents: bool, exist_ok: bool) -> Result<(), PathError> {
        self.check_open()?;
        let result = self.fs.borrow_mut().mkdir(self.store_path(), mode);
        match result {
            Ok(()) => Ok(()),
            Err(FsError::NotFound(_)) if parents && self.pure.parent() != self.pure => {
                self.parent().mkdir(0o777, true, true)?;
                self.mkdir(mode, false, exist_ok)
            }
            Err(FsError::AlreadyExists(_)) if exist_ok && self.is_dir()? => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Creates an empty file, or only updates its modification time if it exists and
    /// `exist_ok` is set.
    pub fn touch(&self, mode: u32, exist_ok: bool) -> Result<(), PathError> {
        self.check_open()?;
        if exist_ok && self.fs.borrow_mut().utime(self.store_path()).is_ok() {
            return Ok(());
        }
        Ok(self.fs.borrow_mut().mkfile(self.store_path(), mode)?)
    }

    /// Removes a file or a symlink.
    pub fn unlink(&self, missing_ok: bool) -> Result<(), PathError> {
        self.check_open()?;
        let result = self.fs.borrow_mut().rm(self.store_path());
        match result {
            Err(FsError::NotFound(_)) if missing_ok => Ok(()),
            other => Ok(other?),
        }
    }

    pub fn rmdir(&self) -> Result<(), PathError> {
        self.check_open()?;
        Ok(self.fs.borrow_mut().rm(self.store_path())?)
    }

    /// Moves this path to `target` and returns the new path.
    pub fn rename(&self, target: impl AsRef<str>) -> Result<Self, PathError> {
        self.move_to(target.as_ref(), false)
    }

    /// Like [`rename`](FakePath::rename), but an existing target is always replaced.
    pub fn replace(&self, target: impl AsRef<str>) -> Result<Self, PathError> {
        self.move_to(target.as_ref(), true)
    }

    fn move_to(&self, target: &str, overwrite: bool) -> Result<Self, PathError> {
        self.check_open()?;
        self.fs
            .borrow_mut()
            .rename(self.store_path(), target, overwrite)?;
        Ok(self.derive_str(target))
    }

    /// Makes this path a symlink to `target`.
    pub fn symlink_to(&self, target: impl AsRef<str>) -> Result<(), PathError> {
        self.check_open()?;
        Ok(self
            .fs
            .borrow_mut()
            .symlink(self.store_path(), target.as_ref())?)
    }

    // Content

    pub fn open(&self, mode: &str, text: TextOptions) -> Result<FileHandle<B>, PathError> {
        self.check_open()?;
        FileHandle::open(Rc::clone(&self.fs), self.store_path(), mode, text)
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, PathError> {
        let mut file = self.open("rb", TextOptions::default())?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_text(&self, text: TextOptions) -> Result<String, PathError> {
        self.open("r", text)?.read_text()
    }

    /// Replaces the content; returns the number of bytes written.
    pub fn write_bytes(&self, data: &[u8]) -> Result<usize, PathError> {
        let mut file = self.open("wb", TextOptions::default())?;
        file.write_all(data)?;
        file.close()?;
        Ok(data.len())
    }

    /// Replaces the content with encoded `data`; returns the number of characters.
    ///
    /// Encoding errors are reported before the file is touched.
    pub fn write_text(&self, data: &str, text: TextOptions) -> Result<usize, PathError> {
        self.check_open()?;
        let separator = line_separator(self.fs.borrow().config());
        let encoded = text.encode(data, separator)?;
        let mut file = self.open("wb", TextOptions::default())?;
        file.write_all(&encoded)?;
        file.close()?;
        Ok(data.chars().count())
    }
}

impl<B: FsBackend> Clone for FakePath<B> {
    fn clone(&self) -> Self {
        Self {
            pure: self.pure.clone(),
            fs: Rc::clone(&self.fs),
            closed: Cell::new(self.closed.get()),
        }
    }
}

impl<B: FsBackend> Deref for FakePath<B> {
    type Target = PurePath;

    fn deref(&self) -> &PurePath {
        &self.pure
    }
}

impl<B: FsBackend> AsRef<str> for FakePath<B> {
    fn as_ref(&self) -> &str {
        self.pure.as_ref()
    }
}

impl<B: FsBackend> fmt::Display for FakePath<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.pure, f)
    }
}

impl<B: FsBackend> fmt::Debug for FakePath<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.pure.flavour().supports_drive() {
            "WindowsPath"
        } else {
            "PosixPath"
        };
        write!(f, "{kind}({:?})", self.pure.as_posix())
    }
}

impl<B: FsBackend> PartialEq for FakePath<B> {
    fn eq(&self, other: &Self) -> bool {
        self.pure == other.pure
    }
}

impl<B: FsBackend> Eq for FakePath<B> {}

impl<B: FsBackend> Hash for FakePath<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pure.hash(state);
    }
}

impl<B: FsBackend> PartialOrd for FakePath<B> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<B: FsBackend> Ord for FakePath<B> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pure.cmp(&other.pure)
    }
}

impl<B: FsBackend, S: AsRef<str>> Div<S> for &FakePath<B> {
    type Output = FakePath<B>;

    fn div(self, rhs: S) -> FakePath<B> {
        self.join(rhs)
    }
}

impl<B: FsBackend, S: AsRef<str>> Div<S> for FakePath<B> {
    type Output = FakePath<B>;

    fn div(self, rhs: S) -> FakePath<B> {
        self.join(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::core::FsResult;
    use crate::path::FakePathlib;
    use crate::vfs::{Entry, MapFS};
    use anyhow::Result;

    fn setup_pathlib() -> FakePathlib<MapFS> {
        let mut fs = MapFS::new();
        fs.mkdir("/home", 0o755).unwrap();
        fs.mkdir("/home/user", 0o755).unwrap();
        fs.write("/home/user/notes.txt", b"remember").unwrap();
        FakePathlib::from_backend(fs)
    }

    fn setup_windows_pathlib() -> FakePathlib<MapFS> {
        FakePathlib::from_backend(MapFS::with_config(FsConfig::windows()))
    }

    /// Store without a canonical form, so `resolve` normalizes lexically.
    struct LexicalFs(MapFS);

    impl FsBackend for LexicalFs {
        fn config(&self) -> &FsConfig {
            self.0.config()
        }

        fn cwd(&self) -> &str {
            self.0.cwd()
        }

        fn cd(&mut self, path: &str) -> FsResult<()> {
            self.0.cd(path)
        }

        fn resolve(&self, path: &str) -> FsResult<&Entry> {
            self.0.resolve(path)
        }

        fn lresolve(&self, path: &str) -> FsResult<&Entry> {
            self.0.lresolve(path)
        }

        fn ls(&self, path: &str) -> FsResult<Vec<String>> {
            self.0.ls(path)
        }

        fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()> {
            self.0.mkdir(path, mode)
        }

        fn mkfile(&mut self, path: &str, mode: u32) -> FsResult<()> {
            self.0.mkfile(path, mode)
        }

        fn symlink(&mut self, path: &str, target: &str) -> FsResult<()> {
            self.0.symlink(path, target)
        }

        fn read(&self, path: &str) -> FsResult<Vec<u8>> {
            self.0.read(path)
        }

        fn write(&mut self, path: &str, content: &[u8]) -> FsResult<()> {
            self.0.write(path, content)
        }

        fn rm(&mut self, path: &str) -> FsResult<()> {
            self.0.rm(path)
        }

        fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> FsResult<()> {
            self.0.rename(from, to, overwrite)
        }

        fn chmod(&mut self, path: &str, mode: u32, follow_symlinks: bool) -> FsResult<()> {
            self.0.chmod(path, mode, follow_symlinks)
        }

        fn utime(&mut self, path: &str) -> FsResult<()> {
            self.0.utime(path)
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn test_file_round_trip() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/user/data.bin"]);
            assert!(!path.exists()?);
            assert_eq!(path.write_bytes(b"12345")?, 5);
            assert!(path.exists()?);
            assert!(path.is_file()?);
            assert!(!path.is_dir()?);
            assert_eq!(path.stat()?.size, 5);
            Ok(())
        }

        #[test]
        fn test_parents_share_the_store() -> Result<()> {
            let lib = setup_pathlib();
            let notes = lib.path(["/home/user/notes.txt"]);
            let parents: Vec<String> = notes.parents().map(|p| p.to_string()).collect();
            assert_eq!(parents, ["/home/user", "/home", "/"]);
            assert!(notes.parents().all(|p| p.is_dir().unwrap_or(false)));
            Ok(())
        }

        #[test]
        fn test_predicates_never_fail_on_missing() -> Result<()> {
            let lib = setup_pathlib();
            let missing = lib.path(["/nope/deeper"]);
            assert!(!missing.exists()?);
            assert!(!missing.is_dir()?);
            assert!(!missing.is_file()?);
            assert!(!missing.is_symlink()?);
            assert!(!missing.is_fifo()?);
            assert!(matches!(missing.stat(), Err(PathError::Fs(FsError::NotFound(_)))));
            Ok(())
        }

        #[test]
        fn test_symlink_predicates() -> Result<()> {
            let lib = setup_pathlib();
            let link = lib.path(["/home/link"]);
            link.symlink_to("/home/user/notes.txt")?;
            assert!(link.is_symlink()?);
            assert!(link.is_file()?);
            assert!(lib.path(["/home/user/notes.txt"]).samefile(&link)?);
            assert_eq!(link.readlink()?, lib.path(["/home/user/notes.txt"]));
            assert!(link.lstat()?.file_type() == Some(EntryType::Symlink));

            let dangling = lib.path(["/home/dangling"]);
            dangling.symlink_to("/home/missing")?;
            assert!(!dangling.exists()?);
            assert!(dangling.is_symlink()?);
            Ok(())
        }

        #[test]
        fn test_special_files() -> Result<()> {
            let lib = setup_pathlib();
            lib.fs().borrow_mut().mknod("/home/sda", EntryType::BlockDevice, 0o660)?;
            lib.fs().borrow_mut().mknod("/home/tty", EntryType::CharDevice, 0o620)?;
            lib.fs().borrow_mut().mknod("/home/pipe", EntryType::Fifo, 0o600)?;
            lib.fs().borrow_mut().mknod("/home/sock", EntryType::Socket, 0o600)?;
            lib.path(["/home/sda-link"]).symlink_to("sda")?;

            assert!(lib.path(["/home/sda"]).is_block_device()?);
            assert!(lib.path(["/home/sda-link"]).is_block_device()?);
            assert!(lib.path(["/home/tty"]).is_char_device()?);
            assert!(lib.path(["/home/pipe"]).is_fifo()?);
            assert!(lib.path(["/home/sock"]).is_socket()?);
            assert!(!lib.path(["/home/sock"]).is_file()?);
            Ok(())
        }

        #[test]
        fn test_samefile() -> Result<()> {
            let lib = setup_pathlib();
            let notes = lib.path(["/home/user/notes.txt"]);
            assert!(notes.samefile("/home/user/../user/notes.txt")?);
            assert!(notes.samefile(lib.path(["/home/user/./notes.txt"]))?);

            let other = lib.path(["/home/other.txt"]);
            other.touch(0o644, false)?;
            assert!(!notes.samefile(&other)?);
            assert!(matches!(
                notes.samefile("/home/missing"),
                Err(PathError::Fs(FsError::NotFound(_)))
            ));
            Ok(())
        }

        #[test]
        fn test_iterdir() -> Result<()> {
            let lib = setup_pathlib();
            lib.path(["/home/b"]).touch(0o644, false)?;
            lib.path(["/home/a"]).mkdir(0o755, false, false)?;
            let names: Vec<String> = lib
                .path(["/home"])
                .iterdir()?
                .iter()
                .map(|p| p.to_string())
                .collect();
            assert_eq!(names, ["/home/a", "/home/b", "/home/user"]);
            assert!(lib.path(["/home/user/notes.txt"]).iterdir().is_err());
            Ok(())
        }
    }

    mod resolution {
        use super::*;

        #[test]
        fn test_absolute_uses_store_cwd() -> Result<()> {
            let lib = setup_pathlib();
            lib.fs().borrow_mut().cd("/home")?;
            assert_eq!(lib.path(["user/../x"]).absolute()?.to_string(), "/home/user/../x");
            assert_eq!(lib.path(["/etc"]).absolute()?.to_string(), "/etc");
            Ok(())
        }

        #[test]
        fn test_resolve_follows_symlinks() -> Result<()> {
            let lib = setup_pathlib();
            lib.path(["/link"]).symlink_to("home/user")?;
            let resolved = lib.path(["/link/notes.txt"]).resolve(true)?;
            assert_eq!(resolved.to_string(), "/home/user/notes.txt");

            let relative = lib.path(["home/./user/../user"]).resolve(false)?;
            assert_eq!(relative.to_string(), "/home/user");
            Ok(())
        }

        #[test]
        fn test_resolve_missing_tail() -> Result<()> {
            let lib = setup_pathlib();
            let loose = lib.path(["/home/user/missing/../other"]).resolve(false)?;
            assert_eq!(loose.to_string(), "/home/user/other");
            assert!(matches!(
                lib.path(["/home/user/missing"]).resolve(true),
                Err(PathError::Fs(FsError::NotFound(_)))
            ));
            Ok(())
        }

        #[test]
        fn test_resolve_without_canonical_form() -> Result<()> {
            let mut fs = MapFS::new();
            fs.mkdir("/work", 0o755)?;
            fs.mkdir("/work/a", 0o755)?;
            fs.mkdir("/work/a/b", 0o755)?;
            fs.write("/work/a/c", b"c")?;
            fs.cd("/work")?;
            let lib = FakePathlib::from_backend(LexicalFs(fs));
            assert_eq!(lib.fs().borrow().canonicalize("a/c")?, None);

            let resolved = lib.path(["a/./b/../c"]).resolve(false)?;
            assert_eq!(resolved.to_string(), "/work/a/c");
            assert!(matches!(
                lib.path(["a/missing"]).resolve(false),
                Err(PathError::Fs(FsError::NotFound(_)))
            ));
            Ok(())
        }

        #[test]
        fn test_resolve_on_windows_store() -> Result<()> {
            let lib = setup_windows_pathlib();
            lib.path(["C:/Temp"]).mkdir(0o777, false, false)?;
            let resolved = lib.path(["/temp"]).resolve(true)?;
            assert_eq!(resolved.to_string(), "C:\\Temp");
            Ok(())
        }

        #[test]
        fn test_expanduser_leaves_plain_paths() -> Result<()> {
            let lib = setup_pathlib();
            assert_eq!(lib.path(["/a/~b"]).expanduser()?, lib.path(["/a/~b"]));
            assert_eq!(lib.path(["x/~"]).expanduser()?, lib.path(["x/~"]));
            Ok(())
        }

        #[test]
        fn test_expanduser_uses_real_home() -> Result<()> {
            let lib = setup_pathlib();
            let Ok(home) = lib.home() else {
                return Ok(());
            };
            let expanded = lib.path(["~/docs"]).expanduser()?;
            assert_eq!(expanded, home.join("docs"));
            Ok(())
        }
    }

    mod mutations {
        use super::*;

        #[test]
        fn test_mkdir_variants() -> Result<()> {
            let lib = setup_pathlib();
            let deep = lib.path(["/a/b/c"]);
            assert!(matches!(
                deep.mkdir(0o755, false, false),
                Err(PathError::Fs(FsError::NotFound(_)))
            ));
            deep.mkdir(0o755, true, false)?;
            assert!(deep.is_dir()?);
            assert_eq!(lib.path(["/a"]).stat()?.permissions(), 0o777);
            assert_eq!(deep.stat()?.permissions(), 0o755);

            assert!(matches!(
                deep.mkdir(0o755, false, false),
                Err(PathError::Fs(FsError::AlreadyExists(_)))
            ));
            deep.mkdir(0o755, false, true)?;

            let file = lib.path(["/home/user/notes.txt"]);
            assert!(file.mkdir(0o755, false, true).is_err());
            Ok(())
        }

        #[test]
        fn test_touch() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/new.txt"]);
            path.touch(0o600, true)?;
            assert_eq!(path.stat()?.permissions(), 0o600);
            path.touch(0o644, true)?;
            assert_eq!(path.stat()?.permissions(), 0o600);
            assert!(matches!(
                path.touch(0o644, false),
                Err(PathError::Fs(FsError::AlreadyExists(_)))
            ));
            Ok(())
        }

        #[test]
        fn test_rename_and_replace() -> Result<()> {
            let lib = setup_pathlib();
            let notes = lib.path(["/home/user/notes.txt"]);
            let moved = notes.rename("/home/notes.md")?;
            assert_eq!(moved, lib.path(["/home/notes.md"]));
            assert!(!notes.exists()?);
            assert_eq!(moved.read_bytes()?, b"remember");

            let other = lib.path(["/home/other"]);
            other.write_bytes(b"other")?;
            let replaced = other.replace(&moved)?;
            assert_eq!(replaced.read_bytes()?, b"other");
            Ok(())
        }

        #[test]
        fn test_rename_refuses_existing_target_on_windows() -> Result<()> {
            let lib = setup_windows_pathlib();
            let a = lib.path(["a.txt"]);
            let b = lib.path(["b.txt"]);
            a.write_bytes(b"a")?;
            b.write_bytes(b"b")?;
            assert!(matches!(
                a.rename(&b),
                Err(PathError::Fs(FsError::AlreadyExists(_)))
            ));
            a.replace(&b)?;
            assert_eq!(lib.path(["B.TXT"]).read_bytes()?, b"a");
            Ok(())
        }

        #[test]
        fn test_unlink_and_rmdir() -> Result<()> {
            let lib = setup_pathlib();
            let notes = lib.path(["/home/user/notes.txt"]);
            notes.unlink(false)?;
            assert!(!notes.exists()?);
            assert!(notes.unlink(false).is_err());
            notes.unlink(true)?;

            let user = lib.path(["/home/user"]);
            user.rmdir()?;
            assert!(!user.exists()?);
            assert!(matches!(
                lib.path(["/"]).rmdir(),
                Err(PathError::Fs(FsError::InvalidPath(_)))
            ));
            Ok(())
        }

        #[test]
        fn test_chmod_and_lchmod() -> Result<()> {
            let lib = setup_pathlib();
            let link = lib.path(["/home/link"]);
            link.symlink_to("/home/user/notes.txt")?;
            link.chmod(0o400)?;
            assert_eq!(lib.path(["/home/user/notes.txt"]).stat()?.permissions(), 0o400);
            link.lchmod(0o700)?;
            assert_eq!(link.lstat()?.permissions(), 0o700);
            assert_eq!(link.stat()?.permissions(), 0o400);

            lib.fs().borrow_mut().set_symlink_permissions(false);
            assert!(matches!(
                link.lchmod(0o755),
                Err(PathError::Fs(FsError::NotSupported(_)))
            ));
            assert_eq!(link.lstat()?.permissions(), 0o700);
            Ok(())
        }
    }

    mod content {
        use super::*;

        #[test]
        fn test_text_round_trip() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/greeting.txt"]);
            assert_eq!(path.write_text("h\u{e9}llo\nw\u{f6}rld", TextOptions::new())?, 11);
            assert_eq!(path.read_text(TextOptions::new())?, "h\u{e9}llo\nw\u{f6}rld");
            assert_eq!(path.stat()?.size, 13);
            Ok(())
        }

        #[test]
        fn test_windows_line_separator() -> Result<()> {
            let lib = setup_windows_pathlib();
            let path = lib.path(["c:/lines.txt"]);
            path.write_text("a\nb\n", TextOptions::new())?;
            assert_eq!(path.read_bytes()?, b"a\r\nb\r\n");
            assert_eq!(path.read_text(TextOptions::new())?, "a\nb\n");
            Ok(())
        }

        #[test]
        fn test_encoding_error_leaves_file_untouched() -> Result<()> {
            let lib = setup_pathlib();
            let notes = lib.path(["/home/user/notes.txt"]);
            let result = notes.write_text("\u{2603}", TextOptions::new().encoding("ascii"));
            assert!(matches!(result, Err(PathError::Encoding { .. })));
            assert_eq!(notes.read_bytes()?, b"remember");
            Ok(())
        }

        #[test]
        fn test_open_handle() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/log.txt"]);
            {
                let mut file = path.open("a", TextOptions::new())?;
                file.write_text("one\n")?;
            }
            {
                let mut file = path.open("a", TextOptions::new())?;
                file.write_text("two\n")?;
            }
            assert_eq!(path.read_text(TextOptions::new())?, "one\ntwo\n");
            assert!(matches!(
                lib.path(["/home"]).read_bytes(),
                Err(PathError::Fs(FsError::IsADirectory(_)))
            ));
            Ok(())
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn test_closed_path_keeps_structure() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/user/notes.txt"]);
            {
                let scoped = path.enter()?;
                assert!(scoped.exists()?);
            }
            assert!(path.is_closed());
            assert!(matches!(path.exists(), Err(PathError::Closed)));
            assert!(matches!(path.stat(), Err(PathError::Closed)));
            assert!(matches!(path.read_bytes(), Err(PathError::Closed)));
            assert!(matches!(path.mkdir(0o777, false, false), Err(PathError::Closed)));
            assert!(matches!(path.resolve(false), Err(PathError::Closed)));
            assert!(matches!(path.enter(), Err(PathError::Closed)));
            assert_eq!(path.name(), "notes.txt");
            assert_eq!(path.parts(), ["/", "home", "user", "notes.txt"]);
            Ok(())
        }

        #[test]
        fn test_derived_paths_are_open() -> Result<()> {
            let lib = setup_pathlib();
            let path = lib.path(["/home/user/notes.txt"]);
            path.close();
            assert!(path.parent().exists()?);
            assert!(path.clone().is_closed());
            assert!((&path.parent() / "notes.txt").exists()?);
            Ok(())
        }
    }
}
