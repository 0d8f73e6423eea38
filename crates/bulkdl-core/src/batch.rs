//! Batch planning: fixed-width, order-preserving slices of the incomplete list.
//!
//! Not size-aware; size-bounded grouping is the partition planner's job.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::completion::Layout;
use crate::keypath::{self, KeyPathError};
use crate::manifest::WorkItem;

/// Default number of concurrent transfers per batch.
pub const DEFAULT_WIDTH: usize = 10;

#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position in the plan.
    pub index: usize,
    pub items: Vec<WorkItem>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size).sum()
    }

    /// Distinct parent directories of this batch's destinations. Top-level
    /// keys contribute the layout base itself.
    pub fn directories(&self, layout: &Layout) -> Result<BTreeSet<PathBuf>, KeyPathError> {
        let base = layout.base();
        let mut dirs = BTreeSet::new();
        for item in &self.items {
            keypath::relative_path(&item.key)?;
            let dir = match keypath::parent_dir(&item.key) {
                Some(parent) => base.join(parent),
                None => base.clone(),
            };
            dirs.insert(dir);
        }
        Ok(dirs)
    }
}

/// Splits `items` into `ceil(len / width)` batches of at most `width` items.
/// A width of 0 is treated as 1.
pub fn plan(items: Vec<WorkItem>, width: usize) -> Vec<Batch> {
    let width = width.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(width));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        let items: Vec<WorkItem> = iter.by_ref().take(width).collect();
        batches.push(Batch {
            index: batches.len(),
            items,
        });
    }
    batches
}

/// Creates every directory (recursively). Existing directories are fine.
pub async fn create_directories(dirs: &BTreeSet<PathBuf>) -> std::io::Result<()> {
    for dir in dirs {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
