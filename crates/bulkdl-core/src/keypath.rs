//! Mapping object keys to local relative paths.
//!
//! A key is a slash-delimited relative path. Empty segments are collapsed;
//! `.` and `..` segments and NUL bytes are rejected so a key can never
//! address anything outside the destination root.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyPathError {
    #[error("key has no path segments")]
    Empty,
    #[error("key names a directory, not an object")]
    Directory,
    #[error("key segment {0:?} is not allowed")]
    ForbiddenSegment(String),
}

/// Relative local path for `key` (e.g. `a/b/file.bin` → `a/b/file.bin`).
pub fn relative_path(key: &str) -> Result<PathBuf, KeyPathError> {
    if key.ends_with('/') {
        return Err(KeyPathError::Directory);
    }
    let mut path = PathBuf::new();
    for segment in key.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\0') {
            return Err(KeyPathError::ForbiddenSegment(segment.to_string()));
        }
        path.push(segment);
    }
    if path.as_os_str().is_empty() {
        return Err(KeyPathError::Empty);
    }
    Ok(path)
}

/// Directory part of `key` relative to the root, or `None` for a top-level object.
pub fn parent_dir(key: &str) -> Option<PathBuf> {
    let path = relative_path(key).ok()?;
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
}
