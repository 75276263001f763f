//! Shared command context.

use crate::config::KeepsakeConfig;
use anyhow::Context;
use keepsake_history::{HistoryConfig, VersionStore};
use keepsake_storage::JsonStorage;
use keepsake_util::path;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command handler needs, built once per invocation.
pub struct App {
    root: PathBuf,
    config: KeepsakeConfig,
    sources: Vec<PathBuf>,
    store: Arc<VersionStore<JsonStorage>>,
}

impl App {
    /// Open the history stored under `root`.
    pub async fn open(root: PathBuf, config: KeepsakeConfig, sources: Vec<PathBuf>) -> Self {
        let storage = JsonStorage::new(path::project_data_dir(&root));
        let store = VersionStore::load(
            storage,
            HistoryConfig::with_max_versions(config.max_versions()),
        )
        .await;

        Self {
            root,
            config,
            sources,
            store: Arc::new(store),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &KeepsakeConfig {
        &self.config
    }

    /// Config files that contributed to [`config`](Self::config).
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn store(&self) -> &Arc<VersionStore<JsonStorage>> {
        &self.store
    }

    /// Resolve a user-supplied file argument against the workspace root.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        }
    }

    /// History key for a file argument: root-relative, `/`-separated.
    pub fn key_for(&self, file: &Path) -> String {
        path::logical_key(&self.resolve(file), &self.root)
    }

    /// Read a workspace file as text.
    pub async fn read_file(&self, file: &Path) -> anyhow::Result<String> {
        let path = self.resolve(file);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Overwrite a workspace file, creating parent directories as needed.
    pub async fn write_file(&self, file: &Path, content: &str) -> anyhow::Result<()> {
        let path = self.resolve(file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_keys_are_root_relative() {
        let dir = TempDir::new().unwrap();
        let app = App::open(dir.path().to_path_buf(), KeepsakeConfig::default(), vec![]).await;

        assert_eq!(app.key_for(Path::new("src/lib.rs")), "src/lib.rs");
        assert_eq!(app.key_for(Path::new("./src/../a.txt")), "a.txt");
        assert_eq!(app.key_for(&dir.path().join("b.txt")), "b.txt");
    }

    #[tokio::test]
    async fn test_store_uses_configured_retention() {
        let dir = TempDir::new().unwrap();
        let config = KeepsakeConfig {
            max_versions: Some(2),
            ..Default::default()
        };
        let app = App::open(dir.path().to_path_buf(), config, vec![]).await;
        for i in 0..4 {
            app.store()
                .save_version("a.txt", &format!("v{i}"), None)
                .await;
        }
        assert_eq!(app.store().get_version_count("a.txt").await, 2);
        assert!(dir.path().join(".keepsake/data/history/file-versions.json").exists());
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrips_through_root() {
        let dir = TempDir::new().unwrap();
        let app = App::open(dir.path().to_path_buf(), KeepsakeConfig::default(), vec![]).await;

        app.write_file(Path::new("nested/x.txt"), "hello").await.unwrap();
        assert_eq!(app.read_file(Path::new("nested/x.txt")).await.unwrap(), "hello");
        assert!(app.read_file(Path::new("missing.txt")).await.is_err());
    }
}
