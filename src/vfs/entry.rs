use chrono::{DateTime, Utc};

pub const S_IFMT: u32 = 0o170_000;
pub const S_IFSOCK: u32 = 0o140_000;
pub const S_IFLNK: u32 = 0o120_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFBLK: u32 = 0o060_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFCHR: u32 = 0o020_000;
pub const S_IFIFO: u32 = 0o010_000;

pub const PERMISSION_BITS: u32 = 0o7777;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
}

impl EntryType {
    /// The `S_IFMT` bits of this type.
    pub fn mode_bits(self) -> u32 {
        match self {
            Self::File => S_IFREG,
            Self::Directory => S_IFDIR,
            Self::Symlink => S_IFLNK,
            Self::BlockDevice => S_IFBLK,
            Self::CharDevice => S_IFCHR,
            Self::Fifo => S_IFIFO,
            Self::Socket => S_IFSOCK,
        }
    }

    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFREG => Some(Self::File),
            S_IFDIR => Some(Self::Directory),
            S_IFLNK => Some(Self::Symlink),
            S_IFBLK => Some(Self::BlockDevice),
            S_IFCHR => Some(Self::CharDevice),
            S_IFIFO => Some(Self::Fifo),
            S_IFSOCK => Some(Self::Socket),
            _ => None,
        }
    }
}

/// Metadata snapshot of an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub mode: u32,
    pub ino: u64,
    pub dev: u64,
    pub nlink: u64,
    pub size: u64,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

impl Stat {
    pub fn file_type(&self) -> Option<EntryType> {
        EntryType::from_mode(self.mode)
    }

    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_BITS
    }
}

/// A node of the in-memory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    entry_type: EntryType,
    name: String,
    ino: u64,
    dev: u64,
    mode: u32,
    content: Option<Vec<u8>>,
    target: Option<String>,
    atime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    ctime: DateTime<Utc>,
}

impl Entry {
    /// `name` keeps the display case of the last component.
    pub fn new(entry_type: EntryType, name: &str, ino: u64, dev: u64, mode: u32) -> Entry {
        let now = Utc::now();
        Entry {
            entry_type,
            name: name.to_string(),
            ino,
            dev,
            mode: mode & PERMISSION_BITS,
            content: (entry_type == EntryType::File).then(Vec::new),
            target: None,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    pub fn symlink(name: &str, target: &str, ino: u64, dev: u64) -> Entry {
        let mut entry = Entry::new(EntryType::Symlink, name, ino, dev, 0o777);
        entry.target = Some(target.to_string());
        entry
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn dev(&self) -> u64 {
        self.dev
    }

    /// Permission bits only.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Type and permission bits, as in `st_mode`.
    pub fn st_mode(&self) -> u32 {
        self.entry_type.mode_bits() | self.mode
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type == EntryType::Symlink
    }

    pub fn content(&self) -> Option<&Vec<u8>> {
        self.content.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn size(&self) -> u64 {
        match (&self.content, &self.target) {
            (Some(content), _) => content.len() as u64,
            (None, Some(target)) => target.len() as u64,
            _ => 0,
        }
    }

    pub fn stat(&self) -> Stat {
        Stat {
            mode: self.st_mode(),
            ino: self.ino,
            dev: self.dev,
            nlink: 1,
            size: self.size(),
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.ctime = Utc::now();
    }

    pub(crate) fn set_mode(&mut self, mode: u32) {
        self.mode = mode & PERMISSION_BITS;
        self.ctime = Utc::now();
    }

    pub(crate) fn set_content(&mut self, content: &[u8]) {
        self.content = Some(content.to_vec());
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        self.mtime = now;
        self.atime = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits_round_trip_through_stat() {
        let entry = Entry::new(EntryType::Directory, "docs", 2, 1, 0o40755);
        let stat = entry.stat();
        assert_eq!(stat.mode, S_IFDIR | 0o755);
        assert_eq!(stat.file_type(), Some(EntryType::Directory));
        assert_eq!(stat.permissions(), 0o755);
        assert_eq!(entry.content(), None);
    }

    #[test]
    fn test_symlink_size_is_target_length() {
        let link = Entry::symlink("link", "/etc/passwd", 3, 1);
        assert!(link.is_symlink());
        assert_eq!(link.target(), Some("/etc/passwd"));
        assert_eq!(link.size(), 11);
    }

    #[test]
    fn test_set_content_updates_size() {
        let mut file = Entry::new(EntryType::File, "a.txt", 4, 1, 0o644);
        assert_eq!(file.size(), 0);
        file.set_content(b"Hello");
        assert_eq!(file.stat().size, 5);
        assert_eq!(EntryType::from_mode(0o777), None);
    }
}
