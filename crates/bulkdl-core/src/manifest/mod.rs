//! Work-item file reader.
//!
//! The lister writes either a flat JSON array of objects or an array of
//! size-bounded partitions, each `{ "size": N, "files": [...] }`. One run
//! processes the flat list or exactly one partition.

mod error;

pub use error::ManifestError;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::keypath;

/// One remote object to transfer. Immutable once produced by the lister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Slash-delimited relative path; the last segment is the filename.
    pub key: String,
    /// Expected object length in bytes.
    pub size: u64,
    /// Pre-signed, time-limited GET locator.
    #[serde(alias = "url")]
    pub signed_url: String,
    #[serde(default, alias = "LastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

impl WorkItem {
    /// Keys ending in `/` are prefix placeholders, not objects.
    pub fn is_directory_placeholder(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// A size-bounded group of work items produced by the partition planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Cumulative size of `files` in bytes.
    pub size: u64,
    pub files: Vec<WorkItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    Flat(Vec<WorkItem>),
    Partitioned(Vec<Partition>),
}

/// The work items chosen for this invocation.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Zero-based partition index when the manifest is partitioned.
    pub partition: Option<usize>,
    pub items: Vec<WorkItem>,
    /// Directory placeholder keys dropped from the list.
    pub skipped_placeholders: usize,
}

/// Reads and parses a work-item file.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::Missing(path.to_path_buf()));
    }
    let data = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&data)
}

/// Parses work-item JSON. The shape is decided by the first entry: an
/// entry with a `files` member means the file is partitioned.
pub fn parse(data: &str) -> Result<Manifest, ManifestError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    let entries = value.as_array().ok_or(ManifestError::NotAList)?;
    let Some(first) = entries.first() else {
        return Err(ManifestError::Empty);
    };
    if first.get("files").is_some() {
        Ok(Manifest::Partitioned(serde_json::from_value(value)?))
    } else {
        Ok(Manifest::Flat(serde_json::from_value(value)?))
    }
}

/// Writes partitions as pretty JSON, the format `parse` reads back.
pub fn write_partitions(path: &Path, partitions: &[Partition]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(partitions)?;
    fs::write(path, json)?;
    Ok(())
}

impl Manifest {
    /// Number of partitions (0 for a flat list).
    pub fn partition_count(&self) -> usize {
        match self {
            Manifest::Flat(_) => 0,
            Manifest::Partitioned(parts) => parts.len(),
        }
    }

    /// Picks the items for this run, drops directory placeholders and
    /// validates every remaining key and URL.
    pub fn select(self, partition: Option<usize>) -> Result<Selection, ManifestError> {
        let items = match (self, partition) {
            (Manifest::Flat(items), None) => items,
            (Manifest::Flat(_), Some(_)) => return Err(ManifestError::NotPartitioned),
            (Manifest::Partitioned(parts), None) => {
                return Err(ManifestError::PartitionRequired { count: parts.len() })
            }
            (Manifest::Partitioned(mut parts), Some(index)) => {
                let count = parts.len();
                if index >= count {
                    return Err(ManifestError::PartitionOutOfRange { index, count });
                }
                parts.swap_remove(index).files
            }
        };

        let before = items.len();
        let items: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| !item.is_directory_placeholder())
            .collect();
        let skipped_placeholders = before - items.len();

        if items.is_empty() {
            return Err(ManifestError::Empty);
        }
        let mut destinations: HashMap<PathBuf, &str> = HashMap::with_capacity(items.len());
        for item in &items {
            let path = validate(item)?;
            if let Some(first) = destinations.insert(path, &item.key) {
                return Err(ManifestError::DuplicateDestination {
                    key: item.key.clone(),
                    other: first.to_string(),
                });
            }
        }

        Ok(Selection {
            partition,
            items,
            skipped_placeholders,
        })
    }
}

/// Checks key and URL; returns the key's relative local path.
fn validate(item: &WorkItem) -> Result<PathBuf, ManifestError> {
    let path = keypath::relative_path(&item.key).map_err(|source| ManifestError::InvalidKey {
        key: item.key.clone(),
        source,
    })?;
    url::Url::parse(&item.signed_url).map_err(|source| ManifestError::InvalidUrl {
        key: item.key.clone(),
        source,
    })?;
    Ok(path)
}
