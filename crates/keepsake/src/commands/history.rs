//! Version history command handlers.
//!
//! Handles saving, listing, inspecting, diffing, restoring and deleting
//! versions of individual files.

use crate::app::App;
use keepsake_history::{format_unified_diff, HistoryError};
use keepsake_util::{IdPrefix, Identifier};
use std::path::Path;
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reject arguments that cannot be version ids before touching the store.
fn check_version_id(id: &str) -> anyhow::Result<()> {
    if !Identifier::has_prefix(id, IdPrefix::Version) {
        anyhow::bail!("'{id}' is not a version id (expected ver_...)");
    }
    Ok(())
}

/// Capture the current content of a file.
pub async fn handle_save(app: &App, file: &Path, message: Option<String>) -> anyhow::Result<()> {
    let key = app.key_for(file);
    let content = app.read_file(file).await?;
    let version = app.store().save_version(&key, &content, message).await;

    info!(file = %key, id = %version.id, "Saved version from CLI");
    println!("Saved {} for {} ({} bytes)", version.id, key, version.size);
    Ok(())
}

/// List the versions of a file, newest first.
pub async fn handle_log(app: &App, file: &Path) -> anyhow::Result<()> {
    let key = app.key_for(file);
    let versions = app.store().get_versions(&key).await;

    if versions.is_empty() {
        println!("No versions for {key}.");
        return Ok(());
    }

    println!("{:<32} {:<20} {:>10}  MESSAGE", "ID", "TIMESTAMP", "SIZE");
    println!("{}", "-".repeat(78));
    for version in versions {
        println!(
            "{:<32} {:<20} {:>10}  {}",
            version.id,
            version.timestamp.format(TIME_FORMAT),
            version.size,
            version.message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Print the content of one version.
pub async fn handle_show(app: &App, file: &Path, id: &str) -> anyhow::Result<()> {
    check_version_id(id)?;
    let key = app.key_for(file);
    let version = app.store().require_version(&key, id).await?;
    print!("{}", version.content);
    if !version.content.is_empty() && !version.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Diff a version against another version, or against the file on disk.
pub async fn handle_diff(
    app: &App,
    file: &Path,
    id: &str,
    other: Option<&str>,
) -> anyhow::Result<()> {
    check_version_id(id)?;
    if let Some(other) = other {
        check_version_id(other)?;
    }
    let key = app.key_for(file);
    let old_label = format!("{key}@{id}");

    let (diff, new_label) = match other {
        Some(other) => {
            // Report which side is missing rather than a bare "not found".
            app.store().require_version(&key, id).await?;
            app.store().require_version(&key, other).await?;
            let diff = app
                .store()
                .diff_versions(&key, id, other)
                .await
                .ok_or_else(|| HistoryError::version_not_found(&key, other))?;
            (diff, format!("{key}@{other}"))
        }
        None => {
            let current = app.read_file(file).await?;
            let diff = app
                .store()
                .diff_with_content(&key, id, &current)
                .await
                .ok_or_else(|| HistoryError::version_not_found(&key, id))?;
            (diff, key.clone())
        }
    };

    if !diff.has_changes() {
        println!("No differences.");
        return Ok(());
    }
    println!("{}", format_unified_diff(&diff, &old_label, &new_label));
    Ok(())
}

/// Print the line-count comparison of two versions.
pub async fn handle_compare(app: &App, file: &Path, a: &str, b: &str) -> anyhow::Result<()> {
    check_version_id(a)?;
    check_version_id(b)?;
    let key = app.key_for(file);
    app.store().require_version(&key, a).await?;
    app.store().require_version(&key, b).await?;
    let comparison = app
        .store()
        .compare_versions(&key, a, b)
        .await
        .ok_or_else(|| HistoryError::version_not_found(&key, b))?;

    println!(
        "+{} -{} {}",
        comparison.added,
        comparison.removed,
        if comparison.changed {
            "changed"
        } else {
            "identical"
        }
    );
    Ok(())
}

/// Write a version back to disk and record the restore as a new version.
pub async fn handle_restore(app: &App, file: &Path, id: &str) -> anyhow::Result<()> {
    check_version_id(id)?;
    let key = app.key_for(file);
    let version = app.store().require_version(&key, id).await?;

    app.write_file(file, &version.content).await?;
    let restored = app
        .store()
        .save_version(&key, &version.content, Some(format!("Restored from {id}")))
        .await;

    info!(file = %key, from = %id, id = %restored.id, "Restored version");
    println!("Restored {key} from {id} (new version {})", restored.id);
    Ok(())
}

/// Delete one version.
pub async fn handle_rm(app: &App, file: &Path, id: &str) -> anyhow::Result<()> {
    check_version_id(id)?;
    let key = app.key_for(file);
    if !app.store().delete_version(&key, id).await {
        return Err(HistoryError::version_not_found(&key, id).into());
    }
    println!("Deleted {id} from {key}");
    Ok(())
}

/// Clear one file's history, or everything with `all`.
pub async fn handle_clear(app: &App, file: Option<&Path>, all: bool) -> anyhow::Result<()> {
    match (file, all) {
        (_, true) => {
            app.store().clear_all_versions().await;
            println!("Cleared all version history.");
        }
        (Some(file), false) => {
            let key = app.key_for(file);
            app.store().clear_versions(&key).await;
            println!("Cleared version history for {key}.");
        }
        (None, false) => anyhow::bail!("Specify a file to clear, or pass --all"),
    }
    Ok(())
}

/// List every file that has history.
pub async fn handle_files(app: &App) -> anyhow::Result<()> {
    let files = app.store().get_files_with_versions().await;
    if files.is_empty() {
        println!("No files have version history.");
        return Ok(());
    }

    println!("{:<48} {:>8} {:>12}", "FILE", "VERSIONS", "SIZE");
    println!("{}", "-".repeat(70));
    for file in files {
        let count = app.store().get_version_count(&file).await;
        let size = app.store().get_total_size(&file).await;
        println!("{file:<48} {count:>8} {size:>12}");
    }
    Ok(())
}

/// Print retention statistics for one file.
pub async fn handle_stats(app: &App, file: &Path) -> anyhow::Result<()> {
    let key = app.key_for(file);
    let count = app.store().get_version_count(&key).await;
    let size = app.store().get_total_size(&key).await;
    let cap = app
        .store()
        .get_max_versions(&key)
        .await
        .unwrap_or(app.store().config().max_versions);

    println!("File: {key}");
    println!("Versions: {count} (max {cap})");
    println!("Total size: {size} bytes");
    if let Some(latest) = app.store().get_latest_version(&key).await {
        println!("Latest: {} ({})", latest.id, latest.timestamp.format(TIME_FORMAT));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ids_need_prefix() {
        assert!(check_version_id(&Identifier::version()).is_ok());
        assert!(check_version_id("ver_anything").is_ok());
        assert!(check_version_id("HEAD").is_err());
        assert!(check_version_id("wch_01hqxyz").is_err());
    }
}
