//! Path utilities.

use std::path::{Component, Path, PathBuf};

/// Name of the project-local keepsake directory.
pub const PROJECT_DIR_NAME: &str = ".keepsake";

/// Get the keepsake configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/keepsake` if set
/// - `~/.config/keepsake` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("keepsake"))
}

/// Get the project-local keepsake directory.
pub fn project_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR_NAME)
}

/// Get the directory holding durable history data for a project.
pub fn project_data_dir(project_root: &Path) -> PathBuf {
    project_dir(project_root).join("data")
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }

    result
}

/// Render a path as a logical history key: relative to `base` when possible,
/// normalized, with `/` separators on every platform.
pub fn logical_key(path: &Path, base: &Path) -> String {
    let normalized = normalize(path);
    let relative = normalized
        .strip_prefix(normalize(base))
        .map(Path::to_path_buf)
        .unwrap_or(normalized);

    let mut key = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    if relative.has_root() {
        key.insert(0, '/');
    }
    key
}
