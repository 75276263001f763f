//! Version history error types.

use thiserror::Error;

/// Result type for version history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur during version history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// An import payload did not parse into the export shape.
    ///
    /// The message is fixed; details are only logged.
    #[error("Invalid version history format")]
    ImportFormat,

    /// A version was requested that the history does not hold.
    #[error("Version {version_id} not found for {file_path}")]
    VersionNotFound {
        file_path: String,
        version_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Create a version not found error.
    pub fn version_not_found(file_path: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self::VersionNotFound {
            file_path: file_path.into(),
            version_id: version_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_format_message_is_fixed() {
        assert_eq!(
            HistoryError::ImportFormat.to_string(),
            "Invalid version history format"
        );
    }

    #[test]
    fn test_version_not_found_names_path_and_id() {
        let err = HistoryError::version_not_found("a.txt", "ver_123");
        assert_eq!(err.to_string(), "Version ver_123 not found for a.txt");
    }
}
