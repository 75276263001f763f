//! Polling change detection for keepsake.
//!
//! The watcher never subscribes to native filesystem events. It periodically
//! asks a [`SnapshotProvider`] for a serialized view of the file tree and
//! fires a [`ChangeCallback`] when that view differs from the last one seen.
//!
//! Providers should serialize trees with [`canonicalize_tree`] or
//! [`canonical_snapshot`] so that sibling order never causes a spurious
//! change notification.

pub mod canonical;
mod error;
pub mod tree;
pub mod watcher;

pub use canonical::{canonical_snapshot, canonicalize_tree};
pub use error::{WatchError, WatchResult};
pub use tree::{DirectoryTreeProvider, FileNode, DEFAULT_IGNORED};
pub use watcher::{
    ChangeCallback, ChangeWatcher, SnapshotProvider, TickOutcome, WatcherConfig,
    DEFAULT_POLL_INTERVAL,
};
