//! Durable storage as one JSON document per key.
//!
//! `["history", "file-versions"]` lives at `<base>/history/file-versions.json`.
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash mid-write leaves the previous document intact. Key locks are
//! `flock`s on `<document>.lock`.

use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT};
use crate::{Storage, StorageError, StorageLock, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, trace};

/// Storage rooted at a directory, typically `<project>/.keepsake/data`.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long [`lock`](Storage::lock) waits for another writer.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Map a key to its document path, refusing anything that could escape
    /// the base directory.
    fn document_path(&self, key: &[&str]) -> StorageResult<PathBuf> {
        let Some((last, parents)) = key.split_last() else {
            return Err(StorageError::invalid_key("Key cannot be empty"));
        };

        let mut path = self.base_path.clone();
        for component in parents {
            check_component(component)?;
            path.push(component);
        }
        check_component(last)?;
        path.push(format!("{last}.json"));
        Ok(path)
    }
}

fn check_component(component: &str) -> StorageResult<()> {
    let traversal = matches!(component, "" | "." | "..");
    if traversal || component.contains(['/', '\\']) {
        return Err(StorageError::invalid_key(format!(
            "Invalid key component: {component:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let path = self.document_path(key)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %path.display(), "No stored document");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), bytes = content.len(), "Read stored document");
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        let path = self.document_path(key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let content = serde_json::to_vec_pretty(value)?;
        let staging = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&staging, &content).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = content.len(), "Wrote stored document");
        Ok(())
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let path = self.document_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed stored document");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        let path = self.document_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn lock(&self, key: &[&str]) -> StorageResult<StorageLock> {
        let path = self.document_path(key)?.with_extension("lock");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let lock = FileLock::acquire(&path, self.lock_timeout).await?;
        Ok(StorageLock::new(lock))
    }
}
