//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid key format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Storage is read-only
    #[error("Storage is read-only")]
    ReadOnly,

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Another writer kept the key locked for the whole wait
    #[error("Timed out after {waited:?} waiting for lock {path}")]
    LockTimeout { path: String, waited: Duration },
}

impl StorageError {
    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_invalid_key_formats_message() {
        let err = StorageError::invalid_key("empty key component");
        assert_eq!(err.to_string(), "Invalid key: empty key component");
    }

    #[test]
    fn test_storage_error_io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_storage_error_json_wraps_serde_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = StorageError::from(json_err);
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_lock_timeout_names_the_lock_file() {
        let err = StorageError::LockTimeout {
            path: "/data/history/file-versions.lock".to_string(),
            waited: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 10s waiting for lock /data/history/file-versions.lock"
        );
    }

    #[test]
    fn test_storage_error_read_only_displays() {
        assert_eq!(StorageError::ReadOnly.to_string(), "Storage is read-only");
    }
}
