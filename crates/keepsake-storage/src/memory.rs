//! In-memory storage implementation for testing.

use crate::{Storage, StorageError, StorageLock, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// In-memory storage for testing.
///
/// Values are kept as JSON strings so the serialization path matches the
/// file backend. The storage can be switched to read-only to simulate a
/// failing durable write. Key locks are in-process async mutexes.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    read_only: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write/remove fail with [`StorageError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of successful writes and removes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Store a raw string under a key, bypassing serialization.
    pub fn insert_raw(&self, key: &[&str], raw: impl Into<String>) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(Self::key_to_string(key), raw.into());
        Ok(())
    }

    /// Fetch the raw string stored under a key.
    pub fn get_raw(&self, key: &[&str]) -> StorageResult<Option<String>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.get(&Self::key_to_string(key)).cloned())
    }

    /// Convert a key slice to a storage key string.
    fn key_to_string(key: &[&str]) -> String {
        key.join("/")
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        self.check_writable()?;
        let json = serde_json::to_string(value)?;
        self.insert_raw(key, json)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        self.check_writable()?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(&Self::key_to_string(key));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(&Self::key_to_string(key)))
    }

    async fn lock(&self, key: &[&str]) -> StorageResult<StorageLock> {
        let key_lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
            Arc::clone(locks.entry(Self::key_to_string(key)).or_default())
        };
        Ok(StorageLock::new(key_lock.lock_owned().await))
    }
}
