use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Div;

use crate::error::PathError;
use crate::flavour::{ParsedPath, PathFlavour};
use crate::fnmatch::WildcardPattern;

/// An immutable path value that never touches a store.
///
/// Built from one or more segments with the join rules of its [`PathFlavour`].
/// Equality, hashing and ordering use the case-folded parts of values of the same
/// flavour; values of different flavours are never equal.
#[derive(Clone)]
pub struct PurePath {
    flavour: PathFlavour,
    drive: String,
    root: String,
    parts: Vec<String>,
    cparts: Vec<String>,
    repr: String,
}

impl PurePath {
    /// Parses and joins `segments`. Other path values can be passed as segments too.
    ///
    /// ```
    /// use vfs_pathlib::{PathFlavour, PurePath};
    ///
    /// let path = PurePath::new(PathFlavour::posix(), ["/etc", "/usr", "lib64"]);
    /// assert_eq!(path.to_string(), "/usr/lib64");
    /// ```
    pub fn new<I, S>(flavour: PathFlavour, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_parsed(flavour, flavour.parse_parts(segments))
    }

    pub fn posix<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(PathFlavour::posix(), segments)
    }

    pub fn windows<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(PathFlavour::windows(), segments)
    }

    pub fn from_parsed(flavour: PathFlavour, parsed: ParsedPath) -> Self {
        let ParsedPath { drive, root, parts } = parsed;
        let repr = flavour.format_parts(&drive, &root, &parts);
        let cparts = flavour.casefold_parts(&parts);
        Self {
            flavour,
            drive,
            root,
            parts,
            cparts,
            repr,
        }
    }

    /// Builds a value from an already split anchor and names.
    fn from_names(&self, drive: &str, root: &str, names: &[String]) -> Self {
        let mut parts = Vec::with_capacity(names.len() + 1);
        if !drive.is_empty() || !root.is_empty() {
            parts.push(format!("{drive}{root}"));
        }
        parts.extend_from_slice(names);
        Self::from_parsed(
            self.flavour,
            ParsedPath {
                drive: drive.to_string(),
                root: root.to_string(),
                parts,
            },
        )
    }

    pub fn flavour(&self) -> PathFlavour {
        self.flavour
    }

    /// Anchor followed by the names.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn drive(&self) -> &str {
        &self.drive
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn anchor(&self) -> String {
        format!("{}{}", self.drive, self.root)
    }

    fn has_anchor(&self) -> bool {
        !self.drive.is_empty() || !self.root.is_empty()
    }

    fn names(&self) -> &[String] {
        if self.has_anchor() {
            &self.parts[1..]
        } else {
            &self.parts
        }
    }

    /// Final component, empty for an anchor-only or empty path.
    pub fn name(&self) -> &str {
        self.names().last().map(String::as_str).unwrap_or_default()
    }

    /// Index of the dot that starts the suffix, if any.
    fn suffix_dot(&self) -> Option<usize> {
        let name = self.name();
        name.rfind('.').filter(|&i| 0 < i && i < name.len() - 1)
    }

    pub fn suffix(&self) -> &str {
        match self.suffix_dot() {
            Some(i) => &self.name()[i..],
            None => "",
        }
    }

    /// All suffixes, e.g. `[".tar", ".gz"]`; leading dots are not suffixes.
    pub fn suffixes(&self) -> Vec<String> {
        let name = self.name();
        if name.ends_with('.') {
            return Vec::new();
        }
        name.trim_start_matches('.')
            .split('.')
            .skip(1)
            .map(|s| format!(".{s}"))
            .collect()
    }

    pub fn stem(&self) -> &str {
        match self.suffix_dot() {
            Some(i) => &self.name()[..i],
            None => self.name(),
        }
    }

    /// The logical parent; the anchor and the empty path are their own parents.
    pub fn parent(&self) -> PurePath {
        let names = self.names();
        if names.is_empty() {
            return self.clone();
        }
        self.from_names(&self.drive, &self.root, &names[..names.len() - 1])
    }

    pub fn parents(&self) -> Parents<'_> {
        Parents { path: self }
    }

    /// True when there is a root and, for drive-letter flavours, a drive as well.
    pub fn is_absolute(&self) -> bool {
        !self.root.is_empty() && (!self.flavour.supports_drive() || !self.drive.is_empty())
    }

    pub fn is_reserved(&self) -> bool {
        self.flavour.is_reserved(&self.parts)
    }

    /// The string form with forward slashes.
    pub fn as_posix(&self) -> String {
        self.repr.replace(self.flavour.sep(), "/")
    }

    pub fn as_uri(&self) -> Result<String, PathError> {
        if !self.is_absolute() {
            return Err(PathError::NotAbsolute(self.repr.clone()));
        }
        Ok(self.flavour.make_uri(&self.drive, &self.as_posix()))
    }

    /// Joins `segments` onto this path.
    pub fn joinpath<I, S>(&self, segments: I) -> PurePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = self.flavour.parse_parts(
            std::iter::once(self.repr.clone())
                .chain(segments.into_iter().map(|s| s.as_ref().to_string())),
        );
        Self::from_parsed(self.flavour, parsed)
    }

    pub fn join(&self, segment: impl AsRef<str>) -> PurePath {
        self.joinpath([segment])
    }

    /// Replaces the final component.
    pub fn with_name(&self, name: &str) -> Result<PurePath, PathError> {
        if self.name().is_empty() {
            return Err(PathError::EmptyName(self.repr.clone()));
        }
        let parsed = self.flavour.parse_parts([name]);
        if name.is_empty()
            || name.ends_with(|c: char| self.flavour.is_sep(c))
            || parsed.has_anchor()
            || parsed.parts.len() != 1
        {
            return Err(PathError::InvalidName(name.to_string()));
        }
        let names = self.names();
        let mut names = names[..names.len() - 1].to_vec();
        names.push(name.to_string());
        Ok(self.from_names(&self.drive, &self.root, &names))
    }

    pub fn with_stem(&self, stem: &str) -> Result<PurePath, PathError> {
        self.with_name(&format!("{stem}{}", self.suffix()))
    }

    /// Replaces the last suffix, or adds one. An empty `suffix` removes it.
    pub fn with_suffix(&self, suffix: &str) -> Result<PurePath, PathError> {
        if suffix.contains(|c: char| self.flavour.is_sep(c))
            || (!suffix.is_empty() && !suffix.starts_with('.'))
            || suffix == "."
        {
            return Err(PathError::InvalidSuffix(suffix.to_string()));
        }
        let name = self.name();
        if name.is_empty() {
            return Err(PathError::EmptyName(self.repr.clone()));
        }
        let new_name = format!("{}{suffix}", &name[..name.len() - self.suffix().len()]);
        let names = self.names();
        let mut names = names[..names.len() - 1].to_vec();
        names.push(new_name);
        Ok(self.from_names(&self.drive, &self.root, &names))
    }

    /// The path relative to `other`, which must be a case-folded prefix of this one.
    pub fn relative_to(&self, other: impl AsRef<str>) -> Result<PurePath, PathError> {
        let to = self.flavour.parse_parts([other.as_ref()]);
        let abs_parts = self.split_anchor(&self.drive, &self.root, &self.parts);
        let to_abs_parts = self.split_anchor(&to.drive, &to.root, &to.parts);
        let n = to_abs_parts.len();

        let matched = if n == 0 {
            !self.has_anchor()
        } else {
            abs_parts.len() >= n
                && self.flavour.casefold_parts(&abs_parts[..n])
                    == self.flavour.casefold_parts(&to_abs_parts)
        };
        if !matched {
            return Err(PathError::NotRelative {
                path: self.repr.clone(),
                other: self.flavour.format_parts(&to.drive, &to.root, &to.parts),
            });
        }
        // A drive-only base keeps the root, which is already the first remaining item.
        let root = if n == 1 { self.root.as_str() } else { "" };
        let skip = if root.is_empty() { n } else { n + 1 };
        Ok(self.from_names("", root, &abs_parts[skip..]))
    }

    /// Parts with the anchor split into separate drive and root items.
    fn split_anchor(&self, drive: &str, root: &str, parts: &[String]) -> Vec<String> {
        if root.is_empty() {
            return parts.to_vec();
        }
        let mut abs = vec![drive.to_string(), root.to_string()];
        abs.extend_from_slice(parts.get(1..).unwrap_or_default());
        abs
    }

    pub fn is_relative_to(&self, other: impl AsRef<str>) -> bool {
        self.relative_to(other).is_ok()
    }

    /// Matches against a wildcard pattern from the right; a pattern with an anchor
    /// must match the whole path.
    pub fn matches(&self, pattern: &str) -> Result<bool, PathError> {
        let pattern = self.flavour.casefold(pattern);
        let parsed = self.flavour.parse_parts([pattern.as_ref()]);
        if parsed.parts.is_empty() {
            return Err(PathError::EmptyPattern);
        }
        if !parsed.drive.is_empty() && parsed.drive != self.flavour.casefold(&self.drive) {
            return Ok(false);
        }
        if !parsed.root.is_empty() && parsed.root != self.flavour.casefold(&self.root) {
            return Ok(false);
        }
        let mut patterns = parsed.parts.as_slice();
        if parsed.has_anchor() {
            if patterns.len() != self.cparts.len() {
                return Ok(false);
            }
            patterns = &patterns[1..];
        } else if patterns.len() > self.cparts.len() {
            return Ok(false);
        }
        for (part, pattern) in self.cparts.iter().rev().zip(patterns.iter().rev()) {
            if !WildcardPattern::new(pattern)?.matches(part) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl AsRef<str> for PurePath {
    fn as_ref(&self) -> &str {
        &self.repr
    }
}

impl fmt::Display for PurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl fmt::Debug for PurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.flavour.supports_drive() {
            "PureWindowsPath"
        } else {
            "PurePosixPath"
        };
        write!(f, "{kind}({:?})", self.as_posix())
    }
}

impl PartialEq for PurePath {
    fn eq(&self, other: &Self) -> bool {
        self.flavour == other.flavour && self.cparts == other.cparts
    }
}

impl Eq for PurePath {}

impl Hash for PurePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flavour.hash(state);
        self.cparts.hash(state);
    }
}

impl PartialOrd for PurePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PurePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.flavour
            .cmp(&other.flavour)
            .then_with(|| self.cparts.cmp(&other.cparts))
    }
}

impl<S: AsRef<str>> Div<S> for &PurePath {
    type Output = PurePath;

    fn div(self, rhs: S) -> PurePath {
        self.join(rhs)
    }
}

impl<S: AsRef<str>> Div<S> for PurePath {
    type Output = PurePath;

    fn div(self, rhs: S) -> PurePath {
        self.join(rhs)
    }
}

/// The logical ancestors of a path, nearest first, ending with the anchor.
#[derive(Clone, Copy)]
pub struct Parents<'a> {
    path: &'a PurePath,
}

impl<'a> Parents<'a> {
    pub fn len(&self) -> usize {
        self.path.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<PurePath> {
        let names = self.path.names();
        if index >= names.len() {
            return None;
        }
        Some(
            self.path
                .from_names(&self.path.drive, &self.path.root, &names[..names.len() - index - 1]),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = PurePath> + use<'a> {
        let parents = *self;
        (0..parents.len()).filter_map(move |i| parents.get(i))
    }
}

impl<'a> IntoIterator for Parents<'a> {
    type Item = PurePath;
    type IntoIter = Box<dyn Iterator<Item = PurePath> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
