use std::io;

use thiserror::Error;

/// Errors reported by a filesystem store.
///
/// The path layer passes these through unchanged, wrapped in [`PathError::Fs`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("No such file or directory: '{0}'")]
    NotFound(String),
    #[error("File exists: '{0}'")]
    AlreadyExists(String),
    #[error("Not a directory: '{0}'")]
    NotADirectory(String),
    #[error("Is a directory: '{0}'")]
    IsADirectory(String),
    #[error("Directory not empty: '{0}'")]
    DirectoryNotEmpty(String),
    #[error("Permission denied: '{0}'")]
    PermissionDenied(String),
    #[error("Too many levels of symbolic links: '{0}'")]
    TooManyLinks(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl FsError {
    /// POSIX errno value for this error kind.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::PermissionDenied(_) => 13,
            Self::AlreadyExists(_) => 17,
            Self::NotADirectory(_) => 20,
            Self::IsADirectory(_) => 21,
            Self::InvalidPath(_) => 22,
            Self::DirectoryNotEmpty(_) => 39,
            Self::TooManyLinks(_) => 40,
            Self::NotSupported(_) => 95,
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::NotFound(_) => io::ErrorKind::NotFound,
            Self::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            Self::NotADirectory(_) => io::ErrorKind::NotADirectory,
            Self::IsADirectory(_) => io::ErrorKind::IsADirectory,
            Self::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            Self::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            Self::TooManyLinks(_) => io::ErrorKind::Other,
            Self::InvalidPath(_) => io::ErrorKind::InvalidInput,
            Self::NotSupported(_) => io::ErrorKind::Unsupported,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

/// Errors reported by path values.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("'{path}' does not start with '{other}'")]
    NotRelative { path: String, other: String },
    #[error("'{0}' has an empty name")]
    EmptyName(String),
    #[error("Invalid name '{0}'")]
    InvalidName(String),
    #[error("Invalid suffix '{0}'")]
    InvalidSuffix(String),
    #[error("empty pattern")]
    EmptyPattern,
    #[error("invalid pattern '{0}'")]
    InvalidPattern(String),
    #[error("relative path can't be expressed as a file URI: '{0}'")]
    NotAbsolute(String),
    #[error("I/O operation on closed path")]
    Closed,
    #[error("Can't determine home directory{0}")]
    HomeDirectory(String),
    #[error("invalid mode: '{0}'")]
    InvalidMode(String),
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
    #[error("'{encoding}' codec can't handle data: {reason}")]
    Encoding { encoding: String, reason: String },
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PathError {
    /// The store error behind this error, if any.
    pub fn fs_error(&self) -> Option<&FsError> {
        match self {
            Self::Fs(err) => Some(err),
            Self::Io(err) => err.get_ref().and_then(|inner| inner.downcast_ref::<FsError>()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_codes() {
        let err = FsError::NotFound("/missing".into());
        assert_eq!(err.errno(), 2);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.to_string(), "No such file or directory: '/missing'");
    }

    #[test]
    fn test_fs_error_survives_io_conversion() {
        let io_err: io::Error = FsError::IsADirectory("/docs".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::IsADirectory);
        let err = PathError::from(io_err);
        assert_eq!(
            err.fs_error(),
            Some(&FsError::IsADirectory("/docs".into()))
        );
    }

    #[test]
    fn test_path_error_messages() {
        let err = PathError::NotRelative {
            path: "passwd".into(),
            other: "/usr".into(),
        };
        assert_eq!(err.to_string(), "'passwd' does not start with '/usr'");
        assert_eq!(PathError::Closed.to_string(), "I/O operation on closed path");
        assert!(PathError::Closed.fs_error().is_none());
    }
}
