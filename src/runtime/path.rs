//! Path utility functions for normalization and comparison.

use anyhow::Result;
use std::path::{Component, Path, PathBuf};

use super::Runtime;

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Make `path` absolute against the runtime's current directory, lexically.
pub fn absolute_path<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    Ok(normalize_path(&runtime.current_dir()?.join(path)))
}

/// Check if `path` is under `dir` by comparing normalized components.
///
/// `/opt/deps/bin/../../etc/passwd` is NOT under `/opt/deps`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);
    normalized_path.starts_with(normalized_dir)
}
