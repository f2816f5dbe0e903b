//! Filesystem-wide settings that decide how path strings are parsed.

use serde::{Deserialize, Serialize};

/// Settings of a fake filesystem that a [`PathFlavour`](crate::PathFlavour) is built from.
///
/// The defaults describe a POSIX filesystem: `/` separator, no alternative separator,
/// no drive letters and case-sensitive names. Missing fields in a serialized config fall
/// back to these defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub path_separator: char,
    pub alternative_path_separator: Option<char>,
    pub supports_drive_letter: bool,
    pub is_case_sensitive: bool,
}

impl FsConfig {
    pub fn posix() -> Self {
        Self {
            path_separator: '/',
            alternative_path_separator: None,
            supports_drive_letter: false,
            is_case_sensitive: true,
        }
    }

    /// Backslash separator, `/` accepted as alternative, drive letters, case-insensitive.
    pub fn windows() -> Self {
        Self {
            path_separator: '\\',
            alternative_path_separator: Some('/'),
            supports_drive_letter: true,
            is_case_sensitive: false,
        }
    }

    /// POSIX separators with case-insensitive names.
    pub fn macos() -> Self {
        Self {
            is_case_sensitive: false,
            ..Self::posix()
        }
    }

    /// The preset matching the platform this crate was compiled for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::macos()
        } else {
            Self::posix()
        }
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::posix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_default_is_posix() {
        assert_eq!(FsConfig::default(), FsConfig::posix());
        assert!(FsConfig::posix().is_case_sensitive);
        assert!(!FsConfig::macos().is_case_sensitive);
    }

    #[test]
    fn test_deserialize_partial_config() -> Result<()> {
        let config: FsConfig =
            serde_json::from_str(r#"{"path_separator": "/", "supports_drive_letter": true}"#)?;
        assert_eq!(config.path_separator, '/');
        assert!(config.supports_drive_letter);
        assert_eq!(config.alternative_path_separator, None);
        assert!(config.is_case_sensitive);
        Ok(())
    }

    #[test]
    fn test_serialize_windows_config() -> Result<()> {
        let json = serde_json::to_string(&FsConfig::windows())?;
        let back: FsConfig = serde_json::from_str(&json)?;
        assert_eq!(back, FsConfig::windows());
        assert!(json.contains(r#""alternative_path_separator":"/""#));
        Ok(())
    }
}
