//! Directory tree snapshots for the watcher.

use crate::canonical::canonical_snapshot;
use crate::watcher::SnapshotProvider;
use crate::WatchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Directory names skipped unless the caller supplies its own list.
pub const DEFAULT_IGNORED: &[&str] = &[".git", ".keepsake", "target", "node_modules"];

/// One entry in a workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Path relative to the tree root, `/`-separated. Empty for the root.
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Relative paths of every file below this node, depth first.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files(&self, out: &mut Vec<String>) {
        if !self.is_dir {
            out.push(self.path.clone());
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }
}

/// Walks a directory on every snapshot request.
#[derive(Debug, Clone)]
pub struct DirectoryTreeProvider {
    root: PathBuf,
    ignored: Arc<Vec<String>>,
}

impl DirectoryTreeProvider {
    /// Provider for `root` using [`DEFAULT_IGNORED`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_ignored(root, DEFAULT_IGNORED.iter().map(|s| s.to_string()))
    }

    /// Provider for `root` that skips entries with any of the given names.
    pub fn with_ignored(root: impl Into<PathBuf>, ignored: impl IntoIterator<Item = String>) -> Self {
        Self {
            root: root.into(),
            ignored: Arc::new(ignored.into_iter().collect()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|i| i == name)
    }

    /// Build the current tree. Blocking.
    pub fn build_tree(&self) -> WatchResult<FileNode> {
        std::fs::metadata(&self.root)?;
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let children = self.read_children(&self.root, "")?;
        Ok(FileNode {
            path: String::new(),
            name,
            is_dir: true,
            size: None,
            modified: None,
            children,
        })
    }

    fn read_children(&self, dir: &Path, prefix: &str) -> WatchResult<Vec<FileNode>> {
        let mut nodes = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                // Entries can disappear between listing and stat.
                Err(e) if is_not_found(&e) => {
                    trace!(error = %e, "Entry vanished during walk");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_ignored(&name) {
                continue;
            }
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(e.into()),
            };

            if metadata.is_dir() {
                let children = self.read_children(entry.path(), &path)?;
                nodes.push(FileNode {
                    path,
                    name,
                    is_dir: true,
                    size: None,
                    modified: None,
                    children,
                });
            } else {
                nodes.push(FileNode {
                    path,
                    name,
                    is_dir: false,
                    size: Some(metadata.len()),
                    modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    children: Vec::new(),
                });
            }
        }

        Ok(nodes)
    }

    /// Relative paths of all files in the tree, sorted.
    pub fn list_files(&self) -> WatchResult<Vec<String>> {
        let mut files = self.build_tree()?.file_paths();
        files.sort();
        Ok(files)
    }
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

#[async_trait]
impl SnapshotProvider for DirectoryTreeProvider {
    async fn snapshot(&self) -> anyhow::Result<String> {
        let provider = self.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            let tree = provider.build_tree()?;
            canonical_snapshot(&tree)
        })
        .await??;
        debug!(root = %self.root.display(), bytes = snapshot.len(), "Tree snapshot taken");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "readme").unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        fs::create_dir_all(dir.path().join(".keepsake/data")).unwrap();
        dir
    }

    #[test]
    fn test_tree_uses_relative_slash_paths() {
        let dir = workspace();
        let provider = DirectoryTreeProvider::new(dir.path());
        let tree = provider.build_tree().unwrap();

        assert!(tree.is_dir);
        assert_eq!(tree.path, "");
        let mut files = tree.file_paths();
        files.sort();
        assert_eq!(files, vec!["README.md", "src/lib.rs", "src/nested/mod.rs"]);
    }

    #[test]
    fn test_ignored_directories_are_skipped() {
        let dir = workspace();
        let files = DirectoryTreeProvider::new(dir.path()).list_files().unwrap();
        assert!(files.iter().all(|f| !f.starts_with(".git")));
        assert!(files.iter().all(|f| !f.starts_with(".keepsake")));

        let custom = DirectoryTreeProvider::with_ignored(dir.path(), vec!["src".to_string()]);
        let files = custom.list_files().unwrap();
        assert!(files.contains(&".git/HEAD".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("src")));
    }

    #[test]
    fn test_file_nodes_carry_size() {
        let dir = workspace();
        let tree = DirectoryTreeProvider::new(dir.path()).build_tree().unwrap();
        let readme = tree.children.iter().find(|c| c.name == "README.md").unwrap();
        assert_eq!(readme.size, Some(6));
        assert!(!readme.is_dir);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let provider = DirectoryTreeProvider::new(dir.path().join("absent"));
        assert!(provider.build_tree().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_and_tracks_changes() {
        let dir = workspace();
        let provider = DirectoryTreeProvider::new(dir.path());

        let first = provider.snapshot().await.unwrap();
        assert_eq!(first, provider.snapshot().await.unwrap());

        fs::write(dir.path().join("new.txt"), "fresh").unwrap();
        let second = provider.snapshot().await.unwrap();
        assert_ne!(first, second);
        assert!(second.contains("new.txt"));
    }

    #[tokio::test]
    async fn test_changes_inside_ignored_dirs_do_not_alter_snapshot() {
        let dir = workspace();
        let provider = DirectoryTreeProvider::new(dir.path());

        let before = provider.snapshot().await.unwrap();
        fs::write(dir.path().join(".keepsake/data/blob.json"), "{}").unwrap();
        assert_eq!(before, provider.snapshot().await.unwrap());
    }
}
