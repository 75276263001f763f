//! File version history for keepsake.
//!
//! This crate keeps, per logical file path, a bounded newest-first history of
//! immutable content snapshots and compares them with a line-based diff:
//! - Save, list, fetch and delete versions
//! - Retention cap per path (oldest evicted first)
//! - Line diffs and full-file unified diff rendering
//! - Whole-history export/import as JSON
//!
//! # Example
//!
//! ```no_run
//! use keepsake_history::{HistoryConfig, VersionStore};
//! use keepsake_storage::JsonStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = VersionStore::load(
//!     JsonStorage::new(".keepsake/data"),
//!     HistoryConfig::default(),
//! )
//! .await;
//!
//! let first = store.save_version("notes.md", "hello\nworld", None).await;
//! let second = store
//!     .save_version("notes.md", "hello\nthere\nworld", Some("edit1".into()))
//!     .await;
//!
//! let diff = store.diff_versions("notes.md", &first.id, &second.id).await;
//! # Ok(())
//! # }
//! ```

pub mod diff;
mod error;
mod store;
mod version;

pub use diff::{compute_diff, format_unified_diff, split_lines, DiffLine, DiffLineKind, DiffResult};
pub use error::{HistoryError, HistoryResult};
pub use store::{HistoryConfig, VersionComparison, VersionStore, DEFAULT_MAX_VERSIONS, STORAGE_KEY};
pub use version::{FileVersion, VersionMetadata};
