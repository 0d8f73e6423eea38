//! Completion checking: is local state already enough for a work item?
//!
//! A file is complete when it exists and its length equals the expected
//! size. Anything else (absent, shorter, longer) is incomplete, and the
//! existing bytes are kept for resume.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::keypath::{self, KeyPathError};
use crate::manifest::WorkItem;

/// Where work items land locally: `<root>[/part-<n>]/<key>`.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    partition_dir: Option<String>,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            partition_dir: None,
        }
    }

    /// Nest everything under a per-partition subdirectory.
    pub fn with_partition(mut self, index: usize) -> Self {
        self.partition_dir = Some(format!("part-{}", index));
        self
    }

    /// Directory that key paths are resolved against.
    pub fn base(&self) -> PathBuf {
        match &self.partition_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    pub fn destination(&self, key: &str) -> Result<PathBuf, KeyPathError> {
        Ok(self.base().join(keypath::relative_path(key)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Complete,
    /// `local_len` is the length of the existing partial file (0 if absent).
    Incomplete { local_len: u64 },
}

impl Classification {
    pub fn is_complete(&self) -> bool {
        matches!(self, Classification::Complete)
    }
}

/// Classifies one item against the file at `path`. Never modifies the file.
pub fn classify(item: &WorkItem, path: &Path) -> Classification {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == item.size => Classification::Complete,
        Ok(meta) if meta.is_file() => Classification::Incomplete {
            local_len: meta.len(),
        },
        _ => Classification::Incomplete { local_len: 0 },
    }
}

/// Running complete/incomplete counters for one run.
///
/// After classification `complete_count + incomplete_count` equals the
/// number of work items, and the byte sums add up to their total size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionTally {
    pub complete_count: usize,
    pub complete_bytes: u64,
    pub incomplete_count: usize,
    pub incomplete_bytes: u64,
}

impl CompletionTally {
    pub fn credit_complete(&mut self, size: u64) {
        self.complete_count += 1;
        self.complete_bytes += size;
    }

    pub fn credit_incomplete(&mut self, size: u64) {
        self.incomplete_count += 1;
        self.incomplete_bytes += size;
    }

    /// Moves one item of `size` bytes from incomplete to complete.
    pub fn mark_transferred(&mut self, size: u64) {
        debug_assert!(self.incomplete_count > 0, "no incomplete item to move");
        self.incomplete_count = self.incomplete_count.saturating_sub(1);
        self.incomplete_bytes = self.incomplete_bytes.saturating_sub(size);
        self.credit_complete(size);
    }

    pub fn total_count(&self) -> usize {
        self.complete_count + self.incomplete_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.complete_bytes + self.incomplete_bytes
    }

    pub fn is_done(&self) -> bool {
        self.incomplete_count == 0
    }
}

/// Splits `items` into the still-incomplete list (input order kept) and
/// a tally crediting both sides.
pub fn classify_all(
    items: Vec<WorkItem>,
    layout: &Layout,
) -> Result<(Vec<WorkItem>, CompletionTally), KeyPathError> {
    let mut tally = CompletionTally::default();
    let mut incomplete = Vec::new();
    for item in items {
        let path = layout.destination(&item.key)?;
        match classify(&item, &path) {
            Classification::Complete => {
                tracing::debug!(key = %item.key, "already complete");
                tally.credit_complete(item.size);
            }
            Classification::Incomplete { local_len } => {
                if local_len > 0 {
                    tracing::debug!(key = %item.key, local_len, size = item.size, "partial file");
                }
                tally.credit_incomplete(item.size);
                incomplete.push(item);
            }
        }
    }
    Ok((incomplete, tally))
}
