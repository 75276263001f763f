//! `keepsake watch`: poll the workspace and optionally capture changed files.

use crate::app::App;
use chrono::Local;
use keepsake_history::VersionStore;
use keepsake_storage::Storage;
use keepsake_watch::{ChangeWatcher, DirectoryTreeProvider, WatcherConfig};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message attached to versions recorded by `watch --capture`.
pub const CAPTURE_MESSAGE: &str = "Captured by watcher";

/// Run the watcher on the workspace root until Ctrl-C.
pub async fn handle_watch(app: &App, interval_ms: Option<u64>, capture: bool) -> anyhow::Result<()> {
    let poll_interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| app.config().poll_interval());
    if poll_interval.is_zero() {
        anyhow::bail!("--interval must be at least 1 ms");
    }

    let provider = DirectoryTreeProvider::with_ignored(app.root(), app.config().ignored());
    let watcher = ChangeWatcher::new(WatcherConfig { poll_interval });

    let store = Arc::clone(app.store());
    let callback_provider = provider.clone();
    watcher.on_change(move || {
        let store = Arc::clone(&store);
        let provider = callback_provider.clone();
        async move {
            println!("[{}] Change detected", Local::now().format("%H:%M:%S"));
            if capture {
                for key in capture_changed_files(store.as_ref(), &provider).await? {
                    println!("  captured {key}");
                }
            }
            Ok::<_, anyhow::Error>(())
        }
    });

    if capture {
        // Baseline every file so the first change only records real edits.
        let saved = capture_changed_files(app.store().as_ref(), &provider).await?;
        info!(files = saved.len(), "Captured initial versions");
    }

    watcher.start(provider);
    info!(watcher = watcher.id(), capture, "Watching workspace");
    println!(
        "Watching {} every {} ms (Ctrl-C to stop)",
        app.root().display(),
        poll_interval.as_millis()
    );

    tokio::signal::ctrl_c().await?;
    watcher.stop();
    println!("Stopped watching.");
    Ok(())
}

/// Save a version of every file whose content differs from its latest version.
///
/// History saved by other keepsake processes is picked up first, so their
/// versions count as the latest. Files that cannot be read as UTF-8 text, or that vanish mid-scan, are
/// skipped. Returns the keys that received a new version.
pub async fn capture_changed_files<S: Storage>(
    store: &VersionStore<S>,
    provider: &DirectoryTreeProvider,
) -> anyhow::Result<Vec<String>> {
    store.reload().await;
    let lister = provider.clone();
    let files = tokio::task::spawn_blocking(move || lister.list_files()).await??;

    let mut saved = Vec::new();
    for key in files {
        let path = provider.root().join(&key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::NotFound) => {
                debug!(file = %key, error = %e, "Skipping file");
                continue;
            }
            Err(e) => {
                warn!(file = %key, error = %e, "Failed to read file");
                continue;
            }
        };

        let unchanged = store
            .get_latest_version(&key)
            .await
            .is_some_and(|latest| latest.content == content);
        if unchanged {
            continue;
        }

        store
            .save_version(&key, &content, Some(CAPTURE_MESSAGE.to_string()))
            .await;
        saved.push(key);
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_history::HistoryConfig;
    use keepsake_storage::MemoryStorage;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_captures_only_changed_text_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/b.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let store = VersionStore::load(MemoryStorage::new(), HistoryConfig::default()).await;
        let provider = DirectoryTreeProvider::new(dir.path());

        let first = capture_changed_files(&store, &provider).await.unwrap();
        assert_eq!(first, vec!["a.txt", "src/b.rs"]);

        assert!(capture_changed_files(&store, &provider)
            .await
            .unwrap()
            .is_empty());

        fs::write(dir.path().join("a.txt"), "two").unwrap();
        let second = capture_changed_files(&store, &provider).await.unwrap();
        assert_eq!(second, vec!["a.txt"]);

        let versions = store.get_versions("a.txt").await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].content, "two");
        assert_eq!(versions[0].message.as_deref(), Some(CAPTURE_MESSAGE));
        assert!(store.get_versions("blob.bin").await.is_empty());
    }

    #[tokio::test]
    async fn test_capture_builds_on_versions_saved_elsewhere() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let watching = VersionStore::load(Arc::clone(&storage), HistoryConfig::default()).await;
        let other = VersionStore::load(Arc::clone(&storage), HistoryConfig::default()).await;
        let provider = DirectoryTreeProvider::new(dir.path());

        capture_changed_files(&watching, &provider).await.unwrap();
        fs::write(dir.path().join("a.txt"), "two").unwrap();
        let manual = other.save_version("a.txt", "two", Some("manual".into())).await;
        other.save_version("b.txt", "elsewhere", None).await;

        // The manual save already matches disk, so nothing new is captured.
        assert!(capture_changed_files(&watching, &provider)
            .await
            .unwrap()
            .is_empty());

        let fresh = VersionStore::load(Arc::clone(&storage), HistoryConfig::default()).await;
        assert_eq!(fresh.get_latest_version("a.txt").await, Some(manual));
        assert_eq!(fresh.get_version_count("b.txt").await, 1);
    }
}
