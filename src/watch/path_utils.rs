// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Express `path` relative to `root` with forward slashes.
///
/// Falls back to canonicalized forms when the plain prefix does not match
/// (symlinked roots, `/private/var` on macOS). Returns `None` when the path
/// lies outside `root` or no longer exists and cannot be canonicalized.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashed(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    path_canon.strip_prefix(&root_canon).ok().map(slashed)
}

fn slashed(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
