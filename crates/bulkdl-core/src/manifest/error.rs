//! Input errors: anything wrong with the work-item file is fatal before a transfer starts.

use std::path::PathBuf;

use crate::keypath::KeyPathError;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("work-item file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read work-item file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed work-item file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("work-item file must contain a JSON array")]
    NotAList,

    #[error("work-item file contains no downloadable objects")]
    Empty,

    #[error("work-item file is partitioned into {count} groups; select one with --partition")]
    PartitionRequired { count: usize },

    #[error("partition {index} out of range (file has {count})")]
    PartitionOutOfRange { index: usize, count: usize },

    #[error("work-item file is a flat list; it has no partitions to select")]
    NotPartitioned,

    #[error("invalid key {key:?}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: KeyPathError,
    },

    #[error("keys {other:?} and {key:?} resolve to the same local file")]
    DuplicateDestination { key: String, other: String },

    #[error("invalid signed URL for {key:?}: {source}")]
    InvalidUrl {
        key: String,
        #[source]
        source: url::ParseError,
    },
}
