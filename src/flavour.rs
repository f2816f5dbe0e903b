//! Path-flavour engine: turns raw path strings into `(drive, root, parts)` triples.
//!
//! A [`PathFlavour`] is a small `Copy` value built once from an [`FsConfig`]. It never
//! touches a filesystem store; everything here is pure string processing:
//!
//! - **Root splitting**: POSIX roots (with the "exactly two leading separators" rule),
//!   drive letters, UNC shares and the extended-length `\\?\` prefix.
//! - **Joining**: several segments are combined left to right with `os.path.join`
//!   anchor-override rules (a later root replaces earlier parts, a later drive replaces
//!   an unrelated earlier drive).
//! - **Case folding**, reserved-name detection and `file://` URI building.
//! - **Home directory lookup** from the real process environment.

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::config::FsConfig;
use crate::error::PathError;

const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

/// Parsed form of one or more path segments.
///
/// `parts[0]` is `drive + root` when either is non-empty, followed by the plain names.
/// `.` never appears in `parts`; `..` is kept literally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPath {
    pub drive: String,
    pub root: String,
    pub parts: Vec<String>,
}

impl ParsedPath {
    pub fn anchor(&self) -> String {
        format!("{}{}", self.drive, self.root)
    }

    pub fn has_anchor(&self) -> bool {
        !self.drive.is_empty() || !self.root.is_empty()
    }

    /// Parts without the leading anchor.
    pub fn names(&self) -> &[String] {
        if self.has_anchor() {
            &self.parts[1..]
        } else {
            &self.parts
        }
    }
}

/// Parsing rules of one filesystem configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathFlavour {
    sep: char,
    altsep: Option<char>,
    has_drive: bool,
    case_sensitive: bool,
}

impl PathFlavour {
    pub fn new(config: &FsConfig) -> Self {
        Self {
            sep: config.path_separator,
            altsep: config.alternative_path_separator,
            has_drive: config.supports_drive_letter,
            case_sensitive: config.is_case_sensitive,
        }
    }

    pub fn posix() -> Self {
        Self::new(&FsConfig::posix())
    }

    pub fn windows() -> Self {
        Self::new(&FsConfig::windows())
    }

    pub fn sep(&self) -> char {
        self.sep
    }

    pub fn altsep(&self) -> Option<char> {
        self.altsep
    }

    pub fn supports_drive(&self) -> bool {
        self.has_drive
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether `c` is the separator or the alternative separator.
    pub fn is_sep(&self, c: char) -> bool {
        c == self.sep || Some(c) == self.altsep
    }

    /// Splits a single segment into `(drive, root, remainder)`.
    ///
    /// The alternative separator is expected to be already replaced by the primary one.
    pub fn split_root(&self, part: &str) -> (String, String, String) {
        if self.has_drive {
            self.split_root_with_drive(part)
        } else {
            self.split_root_posix(part)
        }
    }

    fn split_root_posix(&self, part: &str) -> (String, String, String) {
        if !part.starts_with(self.sep) {
            return (String::new(), String::new(), part.to_string());
        }
        let stripped = part.trim_start_matches(self.sep);
        let leading = (part.len() - stripped.len()) / self.sep.len_utf8();
        // Exactly two leading separators are implementation-defined in POSIX and kept
        // apart; three or more collapse to a single root.
        let root = if leading == 2 {
            self.sep.to_string().repeat(2)
        } else {
            self.sep.to_string()
        };
        (String::new(), root, stripped.to_string())
    }

    fn split_root_with_drive(&self, part: &str) -> (String, String, String) {
        let sep = self.sep;
        let sep_len = sep.len_utf8();

        let (prefix, part) = if part.starts_with(&format!("{sep}{sep}")) {
            self.split_extended_path(part)
        } else {
            (String::new(), part.to_string())
        };

        let mut chars = part.chars();
        let first = chars.next();
        let second = chars.next();
        let third = chars.next();

        if first == Some(sep) && second == Some(sep) && third != Some(sep) {
            // \\machine\mountpoint\directory\etc\...
            // the drive spans machine and mountpoint, the root is the next separator
            let start = 2 * sep_len;
            if let Some(index) = part[start..].find(sep).map(|i| i + start) {
                let next = index + sep_len;
                let index2 = part[next..].find(sep).map(|i| i + next);
                // a UNC share name can't start with a second separator
                if index2 != Some(next) {
                    let end = index2.unwrap_or(part.len());
                    let rest = part.get(end + sep_len..).unwrap_or_default().to_string();
                    let drive = if prefix.is_empty() {
                        part[..end].to_string()
                    } else {
                        format!("{prefix}{}", &part[sep_len..end])
                    };
                    return (drive, sep.to_string(), rest);
                }
            }
        }

        let mut drive = "";
        let mut rest = part.as_str();
        let mut first = first;
        if second == Some(':') && first.is_some_and(|c| c.is_ascii_alphabetic()) {
            drive = &part[..2];
            rest = &part[2..];
            first = third;
        }
        let mut root = String::new();
        if first == Some(sep) {
            root = sep.to_string();
            rest = rest.trim_start_matches(sep);
        }
        (format!("{prefix}{drive}"), root, rest.to_string())
    }

    /// Strips an extended-length prefix (`\\?\`, or `\\?\UNC\` which keeps a `\\` lead).
    fn split_extended_path(&self, s: &str) -> (String, String) {
        let sep = self.sep;
        let ext_prefix = format!("{sep}{sep}?{sep}");
        let Some(rest) = s.strip_prefix(ext_prefix.as_str()) else {
            return (String::new(), s.to_string());
        };
        let unc_prefix = format!("UNC{sep}");
        match rest.strip_prefix(unc_prefix.as_str()) {
            Some(unc_rest) => (format!("{ext_prefix}UNC"), format!("{sep}{sep}{unc_rest}")),
            None => (ext_prefix, rest.to_string()),
        }
    }

    /// Parses a sequence of segments with left-to-right anchor-override semantics.
    ///
    /// A segment with a root discards everything accumulated so far but keeps the
    /// current drive if it has none of its own; a segment with a different drive
    /// discards everything. A segment on the same drive (compared case-insensitively)
    /// without a root is relative to what came before.
    pub fn parse_parts<I, S>(&self, segments: I) -> ParsedPath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut drive = String::new();
        let mut root = String::new();
        let mut names: Vec<String> = Vec::new();

        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() {
                continue;
            }
            let segment = self.replace_altsep(segment);
            let (seg_drive, seg_root, rel) = self.split_root(&segment);

            if !seg_root.is_empty() {
                if !seg_drive.is_empty() || drive.is_empty() {
                    drive = seg_drive;
                }
                root = seg_root;
                names.clear();
            } else if !seg_drive.is_empty() && seg_drive != drive {
                if seg_drive.to_lowercase() != drive.to_lowercase() {
                    drive = seg_drive;
                    root.clear();
                    names.clear();
                } else {
                    // same drive in a different case
                    drive = seg_drive;
                }
            }

            names.extend(
                rel.split(self.sep)
                    .filter(|name| !name.is_empty() && *name != ".")
                    .map(str::to_string),
            );
        }

        let mut parts = Vec::with_capacity(names.len() + 1);
        if !drive.is_empty() || !root.is_empty() {
            parts.push(format!("{drive}{root}"));
        }
        parts.extend(names);
        ParsedPath { drive, root, parts }
    }

    /// Renders parsed parts back to a string; the empty relative path renders as `.`.
    pub fn format_parts(&self, drive: &str, root: &str, parts: &[String]) -> String {
        let sep = self.sep.to_string();
        if !drive.is_empty() || !root.is_empty() {
            let names = parts.get(1..).unwrap_or_default();
            format!("{drive}{root}{}", names.join(&sep))
        } else if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join(&sep)
        }
    }

    /// Lexically collapses `.` and `..` components.
    ///
    /// Only used on paths that are already free of symlinks; `..` directly below an
    /// anchor is dropped, leading `..` of a relative path is kept.
    pub fn collapse(&self, path: &str) -> String {
        let path = self.replace_altsep(path);
        let (drive, root, rest) = self.split_root(&path);
        let mut names: VecDeque<&str> = VecDeque::new();
        for name in rest.split(self.sep) {
            match name {
                "" | "." => {}
                ".." => match names.back() {
                    Some(&last) if last != ".." => {
                        names.pop_back();
                    }
                    _ if !root.is_empty() => {}
                    _ => names.push_back(".."),
                },
                _ => names.push_back(name),
            }
        }
        let joined = names.into_iter().collect::<Vec<_>>().join(&self.sep.to_string());
        let result = format!("{drive}{root}{joined}");
        if result.is_empty() {
            ".".to_string()
        } else {
            result
        }
    }

    pub fn casefold<'a>(&self, s: &'a str) -> Cow<'a, str> {
        if self.case_sensitive {
            Cow::Borrowed(s)
        } else {
            Cow::Owned(s.to_lowercase())
        }
    }

    pub fn casefold_parts(&self, parts: &[String]) -> Vec<String> {
        parts.iter().map(|p| self.casefold(p).into_owned()).collect()
    }

    /// Whether the last component is a reserved device name (drive-letter flavours only).
    ///
    /// The check errs on the side of caution: `foo\NUL` is reported as reserved even
    /// though only some contexts treat it that way.
    pub fn is_reserved(&self, parts: &[String]) -> bool {
        if !self.has_drive {
            return false;
        }
        let Some(last) = parts.last() else {
            return false;
        };
        let unc = format!("{0}{0}", self.sep);
        if parts[0].starts_with(&unc) {
            return false;
        }
        let base = last.split('.').next().unwrap_or_default().to_uppercase();
        if RESERVED_NAMES.contains(&base.as_str()) {
            return true;
        }
        match base.strip_prefix("COM").or_else(|| base.strip_prefix("LPT")) {
            Some(digit) => matches!(digit.as_bytes(), [b'1'..=b'9']),
            None => false,
        }
    }

    /// Builds a `file://` URI for an absolute path.
    pub fn make_uri(&self, drive: &str, as_posix: &str) -> String {
        if !self.has_drive {
            return format!("file://{}", quote(as_posix));
        }
        let bytes = drive.as_bytes();
        if bytes.len() == 2 && bytes[1] == b':' {
            // a path on a local drive: file:///c:/a/b
            let rest = as_posix[2..].trim_start_matches('/');
            format!("file:///{drive}/{}", quote(rest))
        } else {
            // a path on a network share: file://host/share/a/b
            format!("file:{}", quote(as_posix))
        }
    }

    /// Replaces the alternative separator with the primary one.
    pub fn replace_altsep<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match self.altsep {
            Some(alt) if s.contains(alt) => Cow::Owned(s.replace(alt, &self.sep.to_string())),
            _ => Cow::Borrowed(s),
        }
    }

    /// Home directory of the current user, or of `username`, read from the real
    /// process environment. The host separator is translated to this flavour's one.
    pub fn home_directory(&self, username: Option<&str>) -> Result<String, PathError> {
        let home = if self.has_drive {
            self.drive_home_directory(username)?
        } else {
            posix_home_directory(username)?
        };
        Ok(home.replace(std::path::MAIN_SEPARATOR, &self.sep.to_string()))
    }

    fn drive_home_directory(&self, username: Option<&str>) -> Result<String, PathError> {
        let userhome = env_var("HOME")
            .or_else(|| env_var("USERPROFILE"))
            .or_else(|| {
                env_var("HOMEPATH").map(|path| format!("{}{path}", env_var("HOMEDRIVE").unwrap_or_default()))
            })
            .or_else(host_home_dir)
            .ok_or_else(|| PathError::HomeDirectory(String::new()))?;

        let Some(username) = username else {
            return Ok(userhome);
        };
        let current = env_var("USERNAME").or_else(|| env_var("USER"));
        if current.as_deref() == Some(username) {
            return Ok(userhome);
        }
        // Guess: all user directories are siblings named after their users.
        let userhome = userhome.replace(std::path::MAIN_SEPARATOR, &self.sep.to_string());
        let parsed = self.parse_parts([userhome.as_str()]);
        match (parsed.names().last(), current) {
            (Some(last), Some(current)) if *last == current => {
                let mut parts = parsed.parts.clone();
                if let Some(last) = parts.last_mut() {
                    *last = username.to_string();
                }
                Ok(self.format_parts(&parsed.drive, &parsed.root, &parts))
            }
            _ => Err(PathError::HomeDirectory(format!(" for '{username}'"))),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn host_home_dir() -> Option<String> {
    home::home_dir().map(|dir| dir.to_string_lossy().into_owned())
}

fn posix_home_directory(username: Option<&str>) -> Result<String, PathError> {
    match username {
        None => env_var("HOME")
            .or_else(host_home_dir)
            .ok_or_else(|| PathError::HomeDirectory(String::new())),
        Some(username) => std::fs::read_to_string("/etc/passwd")
            .ok()
            .and_then(|passwd| {
                passwd.lines().find_map(|line| {
                    let fields: Vec<&str> = line.split(':').collect();
                    (fields.len() >= 6 && fields[0] == username).then(|| fields[5].to_string())
                })
            })
            .ok_or_else(|| PathError::HomeDirectory(format!(" for '{username}'"))),
    }
}

/// Percent-encodes everything except unreserved characters and `/`.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
