//! Storage layer for keepsake.
//!
//! This crate provides the durable key-value surface the version history is
//! persisted to, with two backends:
//! - JSON file storage (default)
//! - In-memory storage (for testing)

pub mod error;
pub mod json;
pub mod lock;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use lock::{StorageLock, DEFAULT_LOCK_TIMEOUT};
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// A trait for key-value storage backends.
///
/// Keys are represented as path segments, e.g., `["history", "file-versions"]`.
/// Values are serialized/deserialized as JSON. A value written under a key
/// must survive process restart for durable backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Write a value to storage, replacing whatever was stored under the key.
    async fn write<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// Remove a value from storage. Removing a missing key is not an error.
    async fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &[&str]) -> StorageResult<bool>;

    /// Take the exclusive write lock on a key, waiting while another writer
    /// holds it.
    ///
    /// Callers that read, modify and write back a key hold this across the
    /// whole sequence. Backends with a single writer need not override it.
    async fn lock(&self, _key: &[&str]) -> StorageResult<StorageLock> {
        Ok(StorageLock::unlocked())
    }
}

#[async_trait]
impl<S: Storage> Storage for Arc<S> {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        (**self).read(key).await
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        (**self).remove(key).await
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        (**self).exists(key).await
    }

    async fn lock(&self, key: &[&str]) -> StorageResult<StorageLock> {
        (**self).lock(key).await
    }
}
