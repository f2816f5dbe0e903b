//! File handles over a shared store.
//!
//! A [`FileHandle`] loads the whole file into a buffer when it is opened and writes
//! the buffer back to the store on `flush`, `close` and drop. Text helpers decode and
//! encode with the codec and newline policy of [`TextOptions`].

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use crate::config::FsConfig;
use crate::core::{FsBackend, SharedFs};
use crate::error::{FsError, PathError};
use crate::vfs::EntryType;

/// How a file is opened: `r`, `w`, `a` or `x`, optionally with `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    Read,
    Write,
    Append,
    Exclusive,
}

/// A parsed `open()` mode string such as `"r"`, `"wb"` or `"a+"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub kind: OpenKind,
    pub update: bool,
    pub binary: bool,
}

impl OpenMode {
    pub fn parse(mode: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidMode(mode.to_string());
        let mut kind = None;
        let (mut update, mut binary, mut text) = (false, false, false);

        for (i, c) in mode.char_indices() {
            if mode[..i].contains(c) {
                return Err(invalid());
            }
            let next = match c {
                'r' => OpenKind::Read,
                'w' => OpenKind::Write,
                'a' => OpenKind::Append,
                'x' => OpenKind::Exclusive,
                '+' => {
                    update = true;
                    continue;
                }
                'b' => {
                    binary = true;
                    continue;
                }
                't' => {
                    text = true;
                    continue;
                }
                _ => return Err(invalid()),
            };
            if kind.replace(next).is_some() {
                return Err(invalid());
            }
        }

        match kind {
            Some(kind) if !(binary && text) => Ok(Self { kind, update, binary }),
            _ => Err(invalid()),
        }
    }

    pub fn readable(&self) -> bool {
        self.kind == OpenKind::Read || self.update
    }

    pub fn writable(&self) -> bool {
        self.kind != OpenKind::Read || self.update
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Utf8,
    Ascii,
    Latin1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPolicy {
    Strict,
    Ignore,
    Replace,
}

/// Encoding, error policy and newline handling of text operations.
///
/// `newline` follows the usual rules: `None` reads universal newlines and writes the
/// store's line separator, `Some("")` disables translation, any other value is written
/// in place of `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextOptions {
    pub encoding: Option<String>,
    pub errors: Option<String>,
    pub newline: Option<String>,
}

impl TextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_string());
        self
    }

    pub fn errors(mut self, errors: &str) -> Self {
        self.errors = Some(errors.to_string());
        self
    }

    pub fn newline(mut self, newline: &str) -> Self {
        self.newline = Some(newline.to_string());
        self
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn encoding_name(&self) -> &str {
        self.encoding.as_deref().unwrap_or("utf-8")
    }

    fn codec(&self) -> Result<Codec, PathError> {
        let name = self.encoding_name().to_lowercase().replace('_', "-");
        match name.as_str() {
            "utf-8" | "utf8" => Ok(Codec::Utf8),
            "ascii" | "us-ascii" => Ok(Codec::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Codec::Latin1),
            _ => Err(PathError::UnknownEncoding(self.encoding_name().to_string())),
        }
    }

    fn policy(&self) -> Result<ErrorPolicy, PathError> {
        match self.errors.as_deref().unwrap_or("strict") {
            "strict" => Ok(ErrorPolicy::Strict),
            "ignore" => Ok(ErrorPolicy::Ignore),
            "replace" => Ok(ErrorPolicy::Replace),
            other => Err(PathError::UnknownEncoding(format!("error handler '{other}'"))),
        }
    }

    fn check_newline(&self) -> Result<(), PathError> {
        match self.newline.as_deref() {
            None | Some("" | "\n" | "\r" | "\r\n") => Ok(()),
            Some(other) => Err(PathError::InvalidMode(format!(
                "illegal newline value: {other:?}"
            ))),
        }
    }

    fn error(&self, reason: String) -> PathError {
        PathError::Encoding {
            encoding: self.encoding_name().to_string(),
            reason,
        }
    }

    /// Decodes `bytes` and applies read-side newline translation.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, PathError> {
        let policy = self.policy()?;
        self.check_newline()?;
        let mut text = String::with_capacity(bytes.len());

        match self.codec()? {
            Codec::Utf8 => {
                for chunk in bytes.utf8_chunks() {
                    text.push_str(chunk.valid());
                    let invalid = chunk.invalid();
                    if invalid.is_empty() {
                        continue;
                    }
                    match policy {
                        ErrorPolicy::Strict => {
                            return Err(self.error(format!(
                                "invalid start byte 0x{:02x}",
                                invalid[0]
                            )));
                        }
                        ErrorPolicy::Ignore => {}
                        ErrorPolicy::Replace => text.push(char::REPLACEMENT_CHARACTER),
                    }
                }
            }
            Codec::Ascii => {
                for (position, &byte) in bytes.iter().enumerate() {
                    if byte.is_ascii() {
                        text.push(byte as char);
                        continue;
                    }
                    match policy {
                        ErrorPolicy::Strict => {
                            return Err(self.error(format!(
                                "byte 0x{byte:02x} in position {position} not in range(128)"
                            )));
                        }
                        ErrorPolicy::Ignore => {}
                        ErrorPolicy::Replace => text.push(char::REPLACEMENT_CHARACTER),
                    }
                }
            }
            Codec::Latin1 => text.extend(bytes.iter().map(|&b| b as char)),
        }

        if self.newline.is_none() {
            text = text.replace("\r\n", "\n").replace('\r', "\n");
        }
        Ok(text)
    }

    /// Applies write-side newline translation and encodes `text`.
    pub fn encode(&self, text: &str, line_separator: &str) -> Result<Vec<u8>, PathError> {
        let policy = self.policy()?;
        self.check_newline()?;
        let translated = match self.newline.as_deref() {
            None => text.replace('\n', line_separator),
            Some("" | "\n") => text.to_string(),
            Some(newline) => text.replace('\n', newline),
        };

        let limit = match self.codec()? {
            Codec::Utf8 => return Ok(translated.into_bytes()),
            Codec::Ascii => 0x7f,
            Codec::Latin1 => 0xff,
        };
        let mut bytes = Vec::with_capacity(translated.len());
        for (position, c) in translated.chars().enumerate() {
            match u8::try_from(c as u32) {
                Ok(byte) if u32::from(byte) <= limit => bytes.push(byte),
                _ => match policy {
                    ErrorPolicy::Strict => {
                        return Err(self.error(format!(
                            "character {c:?} in position {position} is out of range"
                        )));
                    }
                    ErrorPolicy::Ignore => {}
                    ErrorPolicy::Replace => bytes.push(b'?'),
                },
            }
        }
        Ok(bytes)
    }
}

/// Line separator written for `\n` in text mode.
pub fn line_separator(config: &FsConfig) -> &'static str {
    if config.supports_drive_letter {
        "\r\n"
    } else {
        "\n"
    }
}

/// An open file of a shared store.
pub struct FileHandle<B: FsBackend> {
    fs: SharedFs<B>,
    path: String,
    mode: OpenMode,
    text: TextOptions,
    buffer: Vec<u8>,
    pos: usize,
    dirty: bool,
    closed: bool,
}

impl<B: FsBackend> FileHandle<B> {
    /// Opens `path` in the store according to `mode`.
    ///
    /// `w` truncates and `x` creates the file right away; the content itself is written
    /// back when the handle is flushed.
    pub fn open(
        fs: SharedFs<B>,
        path: &str,
        mode: &str,
        text: TextOptions,
    ) -> Result<Self, PathError> {
        let mode = OpenMode::parse(mode)?;
        if mode.binary && !text.is_default() {
            return Err(PathError::InvalidMode(
                "binary mode doesn't take text options".to_string(),
            ));
        }
        if !mode.binary {
            text.codec()?;
            text.policy()?;
            text.check_newline()?;
        }

        let buffer = {
            let mut store = fs.borrow_mut();
            match mode.kind {
                OpenKind::Read => {
                    let content = store.read(path)?;
                    if mode.update {
                        check_writable(&*store, path)?;
                    }
                    content
                }
                OpenKind::Write => {
                    store.write(path, b"")?;
                    Vec::new()
                }
                OpenKind::Append if store.exists(path) => {
                    check_writable(&*store, path)?;
                    store
                        .resolve(path)?
                        .content()
                        .cloned()
                        .unwrap_or_default()
                }
                OpenKind::Append => {
                    store.write(path, b"")?;
                    Vec::new()
                }
                OpenKind::Exclusive => {
                    store.mkfile(path, 0o644)?;
                    Vec::new()
                }
            }
        };
        debug!(path, ?mode, size = buffer.len(), "open file");

        let pos = if mode.kind == OpenKind::Append {
            buffer.len()
        } else {
            0
        };
        Ok(Self {
            fs,
            path: path.to_string(),
            mode,
            text,
            buffer,
            pos,
            dirty: false,
            closed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Flushes pending writes and closes the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush();
        self.closed = true;
        result
    }

    /// Reads the rest of the file as text.
    pub fn read_text(&mut self) -> Result<String, PathError> {
        self.check_text()?;
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        self.text.decode(&bytes)
    }

    /// Writes `text` and returns the number of characters written.
    pub fn write_text(&mut self, text: &str) -> Result<usize, PathError> {
        self.check_text()?;
        let separator = line_separator(self.fs.borrow().config());
        let bytes = self.text.encode(text, separator)?;
        self.write_all(&bytes)?;
        Ok(text.chars().count())
    }

    fn check_text(&self) -> Result<(), PathError> {
        if self.mode.binary {
            return Err(PathError::InvalidMode(
                "text I/O on a file opened in binary mode".to_string(),
            ));
        }
        Ok(())
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other("I/O operation on closed file"));
        }
        Ok(())
    }
}

fn check_writable<B: FsBackend>(store: &B, path: &str) -> Result<(), FsError> {
    let stat = store.stat(path)?;
    if stat.file_type() == Some(EntryType::Directory) {
        return Err(FsError::IsADirectory(path.to_string()));
    }
    if stat.permissions() & 0o200 == 0 {
        return Err(FsError::PermissionDenied(path.to_string()));
    }
    Ok(())
}

impl<B: FsBackend> Read for FileHandle<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        if !self.mode.readable() {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not readable"));
        }
        let available = self.buffer.get(self.pos..).unwrap_or_default();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl<B: FsBackend> Write for FileHandle<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        if !self.mode.writable() {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "not writable"));
        }
        if self.mode.kind == OpenKind::Append {
            self.pos = self.buffer.len();
        }
        let end = self.pos + buf.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_open()?;
        if !self.dirty {
            return Ok(());
        }
        self.fs.borrow_mut().write(&self.path, &self.buffer)?;
        self.dirty = false;
        Ok(())
    }
}

impl<B: FsBackend> Seek for FileHandle<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open()?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => (self.buffer.len() as u64).checked_add_signed(offset),
            SeekFrom::Current(offset) => (self.pos as u64).checked_add_signed(offset),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "negative seek position")
        })?;
        self.pos = usize::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek position overflow"))?;
        Ok(target)
    }
}

impl<B: FsBackend> Drop for FileHandle<B> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path, error = %err, "failed to flush file on drop");
        }
    }
}
