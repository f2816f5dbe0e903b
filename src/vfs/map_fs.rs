//! This module provides an in-memory filesystem store used as the backend of path values.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::config::FsConfig;
use crate::core::{FsBackend, FsResult};
use crate::error::FsError;
use crate::flavour::PathFlavour;
use crate::vfs::{Entry, EntryType};

/// Maximum number of symlinks followed while resolving one path.
const MAX_SYMLINK_HOPS: usize = 40;

/// Key of an entry: case-folded components, starting with the anchor.
type Key = Vec<String>;

/// An in-memory filesystem that stores entries in an ordered map keyed by path components.
///
/// `MapFS` follows the parsing rules of its [`FsConfig`]: separators, drive letters and
/// case sensitivity are taken from the config, so the same store can emulate a POSIX or a
/// Windows-like filesystem.
///
/// ### Internal state
///
/// * `cwd`: Current Working Directory, an absolute path in display case.
///   - Relative paths are resolved against it.
///   - Root-only paths (`\dir`) on drive-letter configurations take its drive.
/// * `entries`: All files, directories, symlinks and special files.
///   - Key: case-folded components `[anchor, name, ...]`; the anchor is `drive + separator`.
///   - Value: [`Entry`] holding type, inode, permission bits, content or link target.
///   - Uses `BTreeMap` so that the children of a directory form a contiguous range.
/// * `mounts`: Device number of every anchor (the root `/`, drives, UNC shares).
///
/// ### Invariants
///
/// 1. **Mount roots**: every anchor in `mounts` has a `Directory` entry.
/// 2. **Parent consistency**: for any key `[a, b, c]` there is a `Directory` entry `[a, b]`.
/// 3. **Case folding**: keys are folded with the config's case policy; `Entry::name` keeps
///    the case the entry was created with.
///
/// ### Thread Safety
///
/// `MapFS` is not thread-safe. Path values share it through `Rc<RefCell<MapFS>>`.
///
/// ### Example
///
/// ```
/// use vfs_pathlib::{FsBackend, MapFS};
///
/// let mut fs = MapFS::new();
/// fs.mkdir("/docs", 0o755).unwrap();
/// fs.write("/docs/note.txt", b"Hello").unwrap();
/// assert!(fs.exists("/docs/note.txt"));
/// fs.rm("/docs/note.txt").unwrap();
/// ```
pub struct MapFS {
    config: FsConfig,
    flavour: PathFlavour,
    cwd: String,
    entries: BTreeMap<Key, Entry>,
    mounts: BTreeMap<String, u64>,
    next_ino: u64,
    symlink_permissions: bool,
}

/// Outcome of walking a path: the deepest existing entry and what could not be found.
struct Walk {
    key: Key,
    display: Vec<String>,
    missing: Vec<String>,
}

impl MapFS {
    /// Creates a POSIX `MapFS` with only the root directory `/`.
    pub fn new() -> Self {
        Self::with_config(FsConfig::posix())
    }

    /// Creates a `MapFS` following `config`.
    /// Drive-letter configurations start with the `C:` drive mounted; the cwd is its root.
    pub fn with_config(config: FsConfig) -> Self {
        let flavour = PathFlavour::new(&config);
        let anchor = if config.supports_drive_letter {
            format!("C:{}", config.path_separator)
        } else {
            config.path_separator.to_string()
        };
        let mut fs = Self {
            config,
            flavour,
            cwd: anchor.clone(),
            entries: BTreeMap::new(),
            mounts: BTreeMap::new(),
            next_ino: 1,
            symlink_permissions: true,
        };
        fs.mount(&anchor);
        fs
    }

    /// Adds another anchor, such as `D:` or `//server/share`, as an empty root directory.
    pub fn add_mount(&mut self, anchor: &str) -> FsResult<()> {
        let anchor = self.flavour.replace_altsep(anchor);
        let parsed = self.flavour.parse_parts([anchor.as_ref()]);
        if !parsed.names().is_empty() || !parsed.has_anchor() {
            return Err(FsError::InvalidPath(format!("not an anchor: {anchor}")));
        }
        let anchor = self.mount_anchor(&parsed.drive);
        if self.mounts.contains_key(&self.flavour.casefold(&anchor).into_owned()) {
            return Err(FsError::AlreadyExists(anchor));
        }
        self.mount(&anchor);
        Ok(())
    }

    /// Enables or disables changing the permission bits of symlinks themselves.
    /// When disabled, `chmod` without following symlinks is `NotSupported`.
    pub fn set_symlink_permissions(&mut self, enabled: bool) {
        self.symlink_permissions = enabled;
    }

    /// Creates a block device, character device, FIFO or socket entry.
    pub fn mknod(&mut self, path: &str, entry_type: EntryType, mode: u32) -> FsResult<()> {
        if matches!(
            entry_type,
            EntryType::File | EntryType::Directory | EntryType::Symlink
        ) {
            return Err(FsError::InvalidPath(format!(
                "mknod can't create {entry_type:?} entries"
            )));
        }
        self.create(path, |name, ino, dev| Entry::new(entry_type, name, ino, dev, mode))
    }

    fn mount(&mut self, anchor: &str) {
        let dev = self.mounts.len() as u64 + 1;
        let key = self.flavour.casefold(anchor).into_owned();
        self.mounts.insert(key.clone(), dev);
        let ino = self.alloc_ino();
        self.entries
            .insert(vec![key], Entry::new(EntryType::Directory, anchor, ino, dev, 0o755));
    }

    fn alloc_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    /// Anchor of a mount: a POSIX `//` root and drive-relative paths map to `drive + sep`.
    fn mount_anchor(&self, drive: &str) -> String {
        format!("{drive}{}", self.flavour.sep())
    }

    /// Splits `path`, made absolute against the cwd, into its anchor and names.
    fn to_inner(&self, path: &str) -> (String, Vec<String>) {
        let parsed = self.flavour.parse_parts([self.cwd.as_str(), path]);
        let anchor = self.mount_anchor(&parsed.drive);
        (anchor, parsed.names().to_vec())
    }

    /// Walks `path` component by component, following symlinks.
    /// A symlink in the last position is followed only if `follow_last` is set.
    fn walk(&self, path: &str, follow_last: bool) -> FsResult<Walk> {
        let (anchor, names) = self.to_inner(path);
        let mut key = vec![self.flavour.casefold(&anchor).into_owned()];
        let Some(root) = self.entries.get(&key) else {
            return Err(FsError::NotFound(path.to_string()));
        };
        let mut display = vec![root.name().to_string()];
        let mut pending: VecDeque<String> = names.into();
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            if name == ".." {
                if key.len() > 1 {
                    key.pop();
                    display.pop();
                }
                continue;
            }
            key.push(self.flavour.casefold(&name).into_owned());
            let Some(entry) = self.entries.get(&key) else {
                key.pop();
                let mut missing = vec![name];
                missing.extend(pending);
                return Ok(Walk { key, display, missing });
            };
            let is_last = pending.is_empty();
            if entry.is_symlink() && (follow_last || !is_last) {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(FsError::TooManyLinks(path.to_string()));
                }
                key.pop();
                let target = self.flavour.parse_parts([entry.target().unwrap_or_default()]);
                if target.has_anchor() {
                    let (anchor, _) = self.to_inner(&target.anchor());
                    key = vec![self.flavour.casefold(&anchor).into_owned()];
                    let Some(root) = self.entries.get(&key) else {
                        return Err(FsError::NotFound(path.to_string()));
                    };
                    display = vec![root.name().to_string()];
                }
                for name in target.names().iter().rev() {
                    pending.push_front(name.clone());
                }
                continue;
            }
            if !is_last && !entry.is_dir() {
                return Err(FsError::NotADirectory(path.to_string()));
            }
            display.push(entry.name().to_string());
        }

        Ok(Walk {
            key,
            display,
            missing: Vec::new(),
        })
    }

    /// Key of the existing entry at `path`.
    fn locate(&self, path: &str, follow_last: bool) -> FsResult<Key> {
        let walk = self.walk(path, follow_last)?;
        if walk.missing.is_empty() {
            Ok(walk.key)
        } else {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    /// Key of the parent directory of `path` (following symlinks) and the final name.
    fn locate_parent(&self, path: &str) -> FsResult<(Key, String)> {
        let (anchor, mut names) = self.to_inner(path);
        let Some(name) = names.pop() else {
            return Err(FsError::AlreadyExists(path.to_string()));
        };
        if name == ".." {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        let parent = self.flavour.format_parts(
            "",
            &anchor,
            &std::iter::once(anchor.clone()).chain(names).collect::<Vec<_>>(),
        );
        let key = self.locate(&parent, true)?;
        if !self.entries[&key].is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        Ok((key, name))
    }

    fn child_key(&self, parent: &Key, name: &str) -> Key {
        let mut key = parent.clone();
        key.push(self.flavour.casefold(name).into_owned());
        key
    }

    fn check_writable_dir(&self, key: &Key, path: &str) -> FsResult<()> {
        if self.entries[key].mode() & 0o200 == 0 {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }

    /// Inserts a new entry built by `make` at `path`; anything already there is an error.
    fn create<F>(&mut self, path: &str, make: F) -> FsResult<()>
    where
        F: FnOnce(&str, u64, u64) -> Entry,
    {
        let (parent, name) = self.locate_parent(path)?;
        let key = self.child_key(&parent, &name);
        if self.entries.contains_key(&key) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        self.check_writable_dir(&parent, path)?;
        let dev = self.entries[&parent].dev();
        let ino = self.alloc_ino();
        let entry = make(&name, ino, dev);
        debug!(path, kind = ?entry.entry_type(), ino, "create entry");
        self.entries.insert(key, entry);
        Ok(())
    }

    fn has_children(&self, key: &Key) -> bool {
        self.entries
            .range(key.clone()..)
            .nth(1)
            .is_some_and(|(k, _)| k.starts_with(key))
    }

    fn format_display(&self, display: &[String], missing: &[String]) -> String {
        let mut parts: Vec<String> = display.to_vec();
        parts.extend(missing.iter().cloned());
        let anchor = parts[0].clone();
        self.flavour.format_parts("", &anchor, &parts)
    }
}

impl Default for MapFS {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBackend for MapFS {
    fn config(&self) -> &FsConfig {
        &self.config
    }

    fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Changes the current working directory.
    /// `path` can be relative or absolute, but it must be an existing directory.
    fn cd(&mut self, path: &str) -> FsResult<()> {
        let walk = self.walk(path, true)?;
        if !walk.missing.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }
        if !self.entries[&walk.key].is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        self.cwd = self.format_display(&walk.display, &[]);
        debug!(cwd = %self.cwd, "change directory");
        Ok(())
    }

    fn resolve(&self, path: &str) -> FsResult<&Entry> {
        let key = self.locate(path, true)?;
        Ok(&self.entries[&key])
    }

    fn lresolve(&self, path: &str) -> FsResult<&Entry> {
        let key = self.locate(path, false)?;
        Ok(&self.entries[&key])
    }

    /// Follows every symlink of the existing prefix of `path` and appends the missing tail.
    fn canonicalize(&self, path: &str) -> FsResult<Option<String>> {
        let walk = self.walk(path, true)?;
        Ok(Some(self.format_display(&walk.display, &walk.missing)))
    }

    fn ls(&self, path: &str) -> FsResult<Vec<String>> {
        let key = self.locate(path, true)?;
        if !self.entries[&key].is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        Ok(self
            .entries
            .range(key.clone()..)
            .skip(1)
            .take_while(|(k, _)| k.starts_with(&key))
            .filter(|(k, _)| k.len() == key.len() + 1)
            .map(|(_, entry)| entry.name().to_string())
            .collect())
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        self.create(path, |name, ino, dev| {
            Entry::new(EntryType::Directory, name, ino, dev, mode)
        })
    }

    fn mkfile(&mut self, path: &str, mode: u32) -> FsResult<()> {
        self.create(path, |name, ino, dev| Entry::new(EntryType::File, name, ino, dev, mode))
    }

    fn symlink(&mut self, path: &str, target: &str) -> FsResult<()> {
        self.create(path, |name, ino, dev| Entry::symlink(name, target, ino, dev))
    }

    /// Reads the entire content of a file, following symlinks.
    fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let entry = self.resolve(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        if entry.mode() & 0o400 == 0 {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        Ok(entry.content().cloned().unwrap_or_default())
    }

    /// Replaces the content of a file. A missing file is created in an existing directory,
    /// also when `path` is a dangling symlink.
    fn write(&mut self, path: &str, content: &[u8]) -> FsResult<()> {
        let walk = self.walk(path, true)?;
        match walk.missing.len() {
            0 => {}
            1 => {
                let parent = walk.key;
                if !self.entries[&parent].is_dir() {
                    return Err(FsError::NotADirectory(path.to_string()));
                }
                self.check_writable_dir(&parent, path)?;
                let name = &walk.missing[0];
                let key = self.child_key(&parent, name);
                let dev = self.entries[&parent].dev();
                let ino = self.alloc_ino();
                let mut entry = Entry::new(EntryType::File, name, ino, dev, 0o644);
                entry.set_content(content);
                debug!(path, ino, size = content.len(), "create file");
                self.entries.insert(key, entry);
                return Ok(());
            }
            _ => return Err(FsError::NotFound(path.to_string())),
        }
        let entry = self
            .entries
            .get_mut(&walk.key)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        if entry.mode() & 0o200 == 0 {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        debug!(path, size = content.len(), "write file");
        entry.set_content(content);
        Ok(())
    }

    /// Removes a file, symlink or empty directory. The link itself is removed, not its target.
    fn rm(&mut self, path: &str) -> FsResult<()> {
        let key = self.locate(path, false)?;
        if key.len() == 1 {
            return Err(FsError::InvalidPath(format!("the root cannot be removed: {path}")));
        }
        if self.has_children(&key) {
            return Err(FsError::DirectoryNotEmpty(path.to_string()));
        }
        self.check_writable_dir(&key[..key.len() - 1].to_vec(), path)?;
        debug!(path, "remove entry");
        self.entries.remove(&key);
        Ok(())
    }

    /// Moves an entry and, for directories, everything below it.
    ///
    /// Without `overwrite`, an existing destination is an error on drive-letter
    /// configurations; POSIX configurations replace it like `rename(2)`.
    fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> FsResult<()> {
        let src = self.locate(from, false)?;
        if src.len() == 1 {
            return Err(FsError::InvalidPath(format!("the root cannot be moved: {from}")));
        }
        let (parent, name) = self.locate_parent(to)?;
        let dst = self.child_key(&parent, &name);

        // Nothing is touched until every check has passed.
        let mut replaces = false;
        if dst != src {
            if dst.starts_with(&src) {
                return Err(FsError::InvalidPath(format!(
                    "cannot move '{from}' into itself"
                )));
            }
            if let Some(existing) = self.entries.get(&dst) {
                if !overwrite && self.config.supports_drive_letter {
                    return Err(FsError::AlreadyExists(to.to_string()));
                }
                let src_is_dir = self.entries[&src].is_dir();
                match (src_is_dir, existing.is_dir()) {
                    (false, true) => return Err(FsError::IsADirectory(to.to_string())),
                    (true, false) => return Err(FsError::NotADirectory(to.to_string())),
                    (true, true) if self.has_children(&dst) => {
                        return Err(FsError::DirectoryNotEmpty(to.to_string()));
                    }
                    _ => {}
                }
                replaces = true;
            }
        }
        self.check_writable_dir(&src[..src.len() - 1].to_vec(), from)?;
        self.check_writable_dir(&parent, to)?;
        if replaces {
            self.entries.remove(&dst);
        }

        let moved: Vec<Key> = self
            .entries
            .range(src.clone()..)
            .take_while(|(k, _)| k.starts_with(&src))
            .map(|(k, _)| k.clone())
            .collect();
        for old in moved {
            if let Some(mut entry) = self.entries.remove(&old) {
                if old == src {
                    entry.set_name(&name);
                }
                let mut new = dst.clone();
                new.extend_from_slice(&old[src.len()..]);
                self.entries.insert(new, entry);
            }
        }
        debug!(from, to, "rename entry");
        Ok(())
    }

    fn chmod(&mut self, path: &str, mode: u32, follow_symlinks: bool) -> FsResult<()> {
        let key = self.locate(path, follow_symlinks)?;
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if entry.is_symlink() && !self.symlink_permissions {
            return Err(FsError::NotSupported(format!(
                "changing the mode of symlink '{path}'"
            )));
        }
        debug!(path, mode = %format!("{mode:o}"), follow_symlinks, "change mode");
        entry.set_mode(mode);
        Ok(())
    }

    fn utime(&mut self, path: &str) -> FsResult<()> {
        let key = self.locate(path, true)?;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.touch();
        }
        Ok(())
    }
}
