//! Error types for DEPOT operations

use std::time::Duration;
use thiserror::Error;

/// Stable code for a missing object.
pub const FILE_NOT_FOUND_CODE: &str = "file_not_found";
/// Stable code for an object whose content could not be parsed.
pub const FILE_NOT_VALID_CODE: &str = "file_not_valid";
/// Stable code for a listing that produced no child prefixes.
pub const DIR_NOT_FOUND_CODE: &str = "dir_not_found";

/// Object store transport errors.
///
/// These come from the object store client and are surfaced to callers
/// unchanged, except for [`StoreError::NoSuchKey`] which the adapter
/// normalizes into [`DepotError::FileNotFound`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No such key: {key}")]
    NoSuchKey { key: String },

    #[error("{operation} failed for {key}: {reason}")]
    Request {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("{operation} timed out for {key} after {timeout:?}")]
    Timeout {
        operation: &'static str,
        key: String,
        timeout: Duration,
    },

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid object store configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl StoreError {
    /// Returns true if the store reported the key as missing.
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use DEPOT_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: &'static str },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all DEPOT errors.
#[derive(Debug, Error)]
pub enum DepotError {
    #[error("File {path} not found")]
    FileNotFound { path: String },

    #[error("File {path} not valid")]
    FileNotValid { path: String },

    #[error("Directory {dir} not found")]
    DirNotFound { dir: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Upload failed for {} file(s)", failures.len())]
    Upload { failures: Vec<DepotError> },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl DepotError {
    /// Stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => FILE_NOT_FOUND_CODE,
            Self::FileNotValid { .. } => FILE_NOT_VALID_CODE,
            Self::DirNotFound { .. } => DIR_NOT_FOUND_CODE,
            Self::Store(_) => "store_error",
            Self::Config(_) => "config_error",
            Self::Io { .. } => "io_error",
            Self::Upload { .. } => "upload_failed",
            Self::LockPoisoned => "lock_poisoned",
        }
    }

    /// Human-readable message for this error.
    pub fn msg(&self) -> String {
        self.to_string()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. } | Self::DirNotFound { .. })
    }
}

/// Result type alias for DEPOT operations.
pub type DepotResult<T> = Result<T, DepotError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_code_and_message() {
        let err = DepotError::FileNotFound {
            path: "components/foo/1.0.0/package.json".to_string(),
        };
        assert_eq!(err.code(), FILE_NOT_FOUND_CODE);
        assert!(err.msg().contains("components/foo/1.0.0/package.json"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_file_not_valid_code_and_message() {
        let err = DepotError::FileNotValid {
            path: "components/components.json".to_string(),
        };
        assert_eq!(err.code(), FILE_NOT_VALID_CODE);
        assert!(err.msg().contains("components/components.json"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_dir_not_found_code_and_message() {
        let err = DepotError::DirNotFound {
            dir: "components/".to_string(),
        };
        assert_eq!(err.code(), DIR_NOT_FOUND_CODE);
        assert!(err.msg().contains("components/"));
    }

    #[test]
    fn test_store_error_display_timeout() {
        let err = StoreError::Timeout {
            operation: "get_object",
            key: "a/b".to_string(),
            timeout: Duration::from_millis(1500),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("get_object"));
        assert!(msg.contains("a/b"));
        assert!(msg.contains("1.5s"));
    }

    #[test]
    fn test_store_error_no_such_key() {
        let err = StoreError::NoSuchKey {
            key: "missing".to_string(),
        };
        assert!(err.is_no_such_key());
        let other = StoreError::Request {
            operation: "put_object",
            key: "k".to_string(),
            reason: "denied".to_string(),
        };
        assert!(!other.is_no_such_key());
    }

    #[test]
    fn test_store_error_display_invalid_key() {
        let err = StoreError::InvalidKey {
            key: "/weird/x.js".to_string(),
            reason: "empty path segment".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("\"/weird/x.js\""));
        assert!(msg.contains("empty path segment"));
        assert!(!err.is_no_such_key());
    }

    #[test]
    fn test_depot_error_from_variants() {
        let store = DepotError::from(StoreError::InvalidConfig {
            reason: "bad".to_string(),
        });
        assert!(matches!(store, DepotError::Store(_)));
        assert_eq!(store.code(), "store_error");

        let config = DepotError::from(ConfigError::MissingRequired { field: "bucket" });
        assert!(matches!(config, DepotError::Config(_)));
        assert_eq!(config.code(), "config_error");
    }

    #[test]
    fn test_upload_error_counts_failures() {
        let err = DepotError::Upload {
            failures: vec![
                DepotError::LockPoisoned,
                DepotError::Io {
                    path: "/tmp/x".to_string(),
                    reason: "denied".to_string(),
                },
            ],
        };
        assert!(err.msg().contains("2 file(s)"));
        assert_eq!(err.code(), "upload_failed");
    }
}
