//! Version history storage implementation.

use crate::diff::{compute_diff, DiffResult};
use crate::{FileVersion, HistoryError, HistoryResult, VersionMetadata};
use chrono::{Duration, Utc};
use keepsake_storage::{Storage, StorageLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage key the whole history mapping is persisted under.
pub const STORAGE_KEY: &[&str] = &["history", "file-versions"];

/// Retention cap applied to newly seen paths unless configured otherwise.
pub const DEFAULT_MAX_VERSIONS: usize = 50;

type VersionMap = BTreeMap<String, VersionMetadata>;

/// Configuration for version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Retention cap stamped onto each path when it is first seen.
    pub max_versions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_versions: DEFAULT_MAX_VERSIONS,
        }
    }
}

impl HistoryConfig {
    /// Config with a specific retention cap (clamped to at least 1).
    pub fn with_max_versions(max_versions: usize) -> Self {
        Self {
            max_versions: max_versions.max(1),
        }
    }
}

/// Coarse comparison of two versions by line count.
///
/// `added`/`removed` are the line-count delta, not the exact per-line
/// classification; use [`VersionStore::diff_versions`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub added: usize,
    pub removed: usize,
    pub changed: bool,
}

/// Per-path version history backed by a durable key-value store.
///
/// The full mapping is held in memory and rewritten whole under
/// [`STORAGE_KEY`] after every mutation:
/// ```text
/// history/
///   file-versions.json   # { "<filePath>": { filePath, versions[], maxVersions } }
/// ```
///
/// All state sits behind one async mutex that is held across each
/// read-modify-write-persist sequence, so concurrent callers cannot break the
/// retention cap or interleave persisted snapshots.
///
/// Other stores, possibly in other processes, may write the same key. Every
/// mutation therefore takes the storage lock for [`STORAGE_KEY`] and first
/// adopts whatever another writer persisted since this store last synced.
pub struct VersionStore<S: Storage> {
    storage: S,
    config: HistoryConfig,
    state: Mutex<State>,
}

struct State {
    versions: VersionMap,
    /// The mapping as this store last read or wrote it, `None` if storage
    /// held nothing usable.
    synced: Option<VersionMap>,
}

impl<S: Storage> VersionStore<S> {
    /// Load the store from durable storage.
    ///
    /// A missing or malformed record is treated as empty history.
    pub async fn load(storage: S, config: HistoryConfig) -> Self {
        let synced = match storage.read::<VersionMap>(STORAGE_KEY).await {
            Ok(Some(map)) => match validate_map(&map) {
                Ok(()) => {
                    debug!(files = map.len(), "Loaded version history");
                    Some(map)
                }
                Err(reason) => {
                    warn!(%reason, "Stored version history is inconsistent, starting empty");
                    None
                }
            },
            Ok(None) => {
                debug!("No stored version history");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to load version history, starting empty");
                None
            }
        };

        Self {
            storage,
            config: HistoryConfig::with_max_versions(config.max_versions),
            state: Mutex::new(State {
                versions: synced.clone().unwrap_or_default(),
                synced,
            }),
        }
    }

    /// The configuration this store was loaded with.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Pick up changes another writer persisted since this store last synced.
    pub async fn reload(&self) {
        let mut state = self.state.lock().await;
        self.sync(&mut state).await;
    }

    /// Capture a new version of `file_path`.
    ///
    /// The new version becomes the head of the path's history and the oldest
    /// entries past the cap are evicted. A failed durable write is logged and
    /// does not affect the returned version or the in-memory history.
    pub async fn save_version(
        &self,
        file_path: &str,
        content: &str,
        message: Option<String>,
    ) -> FileVersion {
        let mut state = self.state.lock().await;
        let guard = self.begin_write(&mut state).await;
        let metadata = state
            .versions
            .entry(file_path.to_string())
            .or_insert_with(|| VersionMetadata::new(file_path, self.config.max_versions));

        // Keep timestamps strictly decreasing from head to tail even when
        // the clock has not advanced between two saves.
        let mut timestamp = Utc::now();
        if let Some(head) = metadata.versions.first() {
            if timestamp <= head.timestamp {
                timestamp = head.timestamp + Duration::nanoseconds(1);
            }
        }

        let version = FileVersion::new(file_path, content, timestamp, message);
        metadata.push_newest(version.clone());

        debug!(
            file = %file_path,
            id = %version.id,
            size = version.size,
            count = metadata.versions.len(),
            "Saved version"
        );

        self.persist(&mut state, guard).await;
        version
    }

    /// All versions of a path, newest first. Empty if the path is unknown.
    pub async fn get_versions(&self, file_path: &str) -> Vec<FileVersion> {
        let state = self.state.lock().await;
        state
            .versions
            .get(file_path)
            .map(|m| m.versions.clone())
            .unwrap_or_default()
    }

    /// A single version by id.
    pub async fn get_version(&self, file_path: &str, version_id: &str) -> Option<FileVersion> {
        let state = self.state.lock().await;
        find_version(&state.versions, file_path, version_id).cloned()
    }

    /// Like [`get_version`](Self::get_version) but reports a missing version as an error.
    pub async fn require_version(
        &self,
        file_path: &str,
        version_id: &str,
    ) -> HistoryResult<FileVersion> {
        self.get_version(file_path, version_id)
            .await
            .ok_or_else(|| HistoryError::version_not_found(file_path, version_id))
    }

    /// The newest version of a path.
    pub async fn get_latest_version(&self, file_path: &str) -> Option<FileVersion> {
        let state = self.state.lock().await;
        state
            .versions
            .get(file_path)
            .and_then(|m| m.versions.first())
            .cloned()
    }

    /// Delete one version. Returns whether anything was removed.
    pub async fn delete_version(&self, file_path: &str, version_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let guard = self.begin_write(&mut state).await;
        let Some(metadata) = state.versions.get_mut(file_path) else {
            return false;
        };
        let Some(index) = metadata.versions.iter().position(|v| v.id == version_id) else {
            return false;
        };

        metadata.versions.remove(index);
        info!(file = %file_path, id = %version_id, "Deleted version");
        self.persist(&mut state, guard).await;
        true
    }

    /// Forget a path's history entirely.
    pub async fn clear_versions(&self, file_path: &str) {
        let mut state = self.state.lock().await;
        let guard = self.begin_write(&mut state).await;
        if state.versions.remove(file_path).is_some() {
            info!(file = %file_path, "Cleared version history");
        }
        self.persist(&mut state, guard).await;
    }

    /// Forget every path's history.
    pub async fn clear_all_versions(&self) {
        let mut state = self.state.lock().await;
        let guard = self.begin_write(&mut state).await;
        let files = state.versions.len();
        state.versions.clear();
        info!(files, "Cleared all version history");
        self.persist(&mut state, guard).await;
    }

    /// Number of versions held for a path.
    pub async fn get_version_count(&self, file_path: &str) -> usize {
        let state = self.state.lock().await;
        state.versions.get(file_path).map_or(0, |m| m.versions.len())
    }

    /// Retention cap of a path, fixed when it was first seen. `None` if the
    /// path has no history entry.
    pub async fn get_max_versions(&self, file_path: &str) -> Option<usize> {
        let state = self.state.lock().await;
        state.versions.get(file_path).map(|m| m.max_versions)
    }

    /// Total byte size of all versions held for a path.
    pub async fn get_total_size(&self, file_path: &str) -> u64 {
        let state = self.state.lock().await;
        state
            .versions
            .get(file_path)
            .map_or(0, VersionMetadata::total_size)
    }

    /// Paths that have a history entry, in lexicographic order.
    pub async fn get_files_with_versions(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.versions.keys().cloned().collect()
    }

    /// Coarse line-count comparison of two versions of the same path.
    ///
    /// Returns `None` if either version is missing.
    pub async fn compare_versions(
        &self,
        file_path: &str,
        version_a: &str,
        version_b: &str,
    ) -> Option<VersionComparison> {
        let state = self.state.lock().await;
        let a = find_version(&state.versions, file_path, version_a)?;
        let b = find_version(&state.versions, file_path, version_b)?;

        let (lines_a, lines_b) = (a.line_count(), b.line_count());
        Some(VersionComparison {
            added: lines_b.saturating_sub(lines_a),
            removed: lines_a.saturating_sub(lines_b),
            changed: a.content != b.content,
        })
    }

    /// Exact line diff from `version_a` to `version_b`.
    ///
    /// Returns `None` if either version is missing.
    pub async fn diff_versions(
        &self,
        file_path: &str,
        version_a: &str,
        version_b: &str,
    ) -> Option<DiffResult> {
        let (old, new) = {
            let state = self.state.lock().await;
            let a = find_version(&state.versions, file_path, version_a)?;
            let b = find_version(&state.versions, file_path, version_b)?;
            (a.content.clone(), b.content.clone())
        };
        Some(compute_diff(&old, &new))
    }

    /// Exact line diff from a stored version to arbitrary current content.
    pub async fn diff_with_content(
        &self,
        file_path: &str,
        version_id: &str,
        current: &str,
    ) -> Option<DiffResult> {
        let old = self.get_version(file_path, version_id).await?.content;
        Some(compute_diff(&old, current))
    }

    /// Serialize the whole history as JSON with RFC 3339 timestamps.
    pub async fn export_versions(&self) -> HistoryResult<String> {
        let state = self.state.lock().await;
        Ok(serde_json::to_string_pretty(&state.versions)?)
    }

    /// Replace the whole history with a previously exported payload.
    ///
    /// The payload is parsed and validated before anything is touched; on
    /// failure the current history is left exactly as it was.
    pub async fn import_versions(&self, data: &str) -> HistoryResult<()> {
        let imported: VersionMap = serde_json::from_str(data).map_err(|e| {
            warn!(error = %e, "Rejected version history import");
            HistoryError::ImportFormat
        })?;
        validate_map(&imported).map_err(|reason| {
            warn!(%reason, "Rejected version history import");
            HistoryError::ImportFormat
        })?;

        let mut state = self.state.lock().await;
        let guard = self.begin_write(&mut state).await;
        state.versions = imported;
        info!(files = state.versions.len(), "Imported version history");
        self.persist(&mut state, guard).await;
        Ok(())
    }

    /// Lock the storage key and adopt any newer persisted mapping.
    ///
    /// Returns `None` if the lock could not be taken; the mutation then stays
    /// in memory rather than overwrite another writer's data.
    async fn begin_write(&self, state: &mut State) -> Option<StorageLock> {
        match self.storage.lock(STORAGE_KEY).await {
            Ok(guard) => {
                self.sync(state).await;
                Some(guard)
            }
            Err(e) => {
                warn!(error = %e, "Failed to lock version history, change kept in memory only");
                None
            }
        }
    }

    /// Replace in-memory history with the persisted mapping if another
    /// writer changed it. Unreadable or inconsistent records are ignored.
    async fn sync(&self, state: &mut State) {
        let stored = match self.storage.read::<VersionMap>(STORAGE_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to re-read version history, keeping in-memory copy");
                return;
            }
        };
        if stored == state.synced {
            return;
        }
        if let Some(map) = &stored {
            if let Err(reason) = validate_map(map) {
                warn!(%reason, "Stored version history is inconsistent, keeping in-memory copy");
                return;
            }
        }

        debug!(
            files = stored.as_ref().map_or(0, BTreeMap::len),
            "Adopted version history written elsewhere"
        );
        state.versions = stored.clone().unwrap_or_default();
        state.synced = stored;
    }

    /// Write the whole mapping back to durable storage, logging failures.
    async fn persist(&self, state: &mut State, guard: Option<StorageLock>) {
        let Some(_guard) = guard else {
            return;
        };
        match self.storage.write(STORAGE_KEY, &state.versions).await {
            Ok(()) => {
                state.synced = Some(state.versions.clone());
                debug!(files = state.versions.len(), "Persisted version history");
            }
            Err(e) => warn!(error = %e, "Failed to persist version history"),
        }
    }
}

fn find_version<'a>(
    versions: &'a VersionMap,
    file_path: &str,
    version_id: &str,
) -> Option<&'a FileVersion> {
    versions
        .get(file_path)?
        .versions
        .iter()
        .find(|v| v.id == version_id)
}

fn validate_map(map: &VersionMap) -> Result<(), String> {
    map.iter().try_for_each(|(key, metadata)| metadata.validate(key))
}
