//! Version data structures.

use crate::diff::split_lines;
use chrono::{DateTime, Utc};
use keepsake_util::Identifier;
use serde::{Deserialize, Serialize};

/// An immutable snapshot of one file's content at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    /// Unique, time-ordered identifier (`ver_<ulid>`).
    pub id: String,

    /// Logical path of the file. Never checked against a real filesystem.
    pub file_path: String,

    /// Full text payload.
    pub content: String,

    /// When the version was captured.
    pub timestamp: DateTime<Utc>,

    /// Byte length of `content` (UTF-8).
    pub size: u64,

    /// Optional free-text annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FileVersion {
    /// Capture a new version with a fresh identifier.
    pub(crate) fn new(
        file_path: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: Option<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Identifier::version(),
            file_path: file_path.into(),
            size: content.len() as u64,
            content,
            timestamp,
            message,
        }
    }

    /// Number of lines in the content, counted the way the diff engine splits.
    pub fn line_count(&self) -> usize {
        split_lines(&self.content).len()
    }
}

/// The bounded, newest-first history of one file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    /// Logical path this history belongs to.
    pub file_path: String,

    /// Versions, newest first.
    pub versions: Vec<FileVersion>,

    /// Retention cap, fixed when the path is first seen.
    pub max_versions: usize,
}

impl VersionMetadata {
    pub(crate) fn new(file_path: impl Into<String>, max_versions: usize) -> Self {
        Self {
            file_path: file_path.into(),
            versions: Vec::new(),
            max_versions,
        }
    }

    /// Insert at the head and evict the oldest entries past the cap.
    pub(crate) fn push_newest(&mut self, version: FileVersion) {
        self.versions.insert(0, version);
        self.versions.truncate(self.max_versions);
    }

    /// Sum of `size` across all versions.
    pub fn total_size(&self) -> u64 {
        self.versions.iter().map(|v| v.size).sum()
    }

    /// Check the shape invariants an imported or loaded record must satisfy.
    pub(crate) fn validate(&self, key: &str) -> Result<(), String> {
        if self.file_path != key {
            return Err(format!(
                "metadata path {:?} does not match key {:?}",
                self.file_path, key
            ));
        }
        if self.max_versions == 0 {
            return Err(format!("maxVersions must be positive for {key:?}"));
        }
        if self.versions.len() > self.max_versions {
            return Err(format!(
                "{} versions exceed maxVersions {} for {key:?}",
                self.versions.len(),
                self.max_versions
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for version in &self.versions {
            if version.file_path != key {
                return Err(format!(
                    "version {} belongs to {:?}, not {key:?}",
                    version.id, version.file_path
                ));
            }
            if version.size != version.content.len() as u64 {
                return Err(format!(
                    "version {} records size {} but holds {} bytes",
                    version.id,
                    version.size,
                    version.content.len()
                ));
            }
            if !seen.insert(version.id.as_str()) {
                return Err(format!("duplicate version id {} for {key:?}", version.id));
            }
        }
        Ok(())
    }
}
