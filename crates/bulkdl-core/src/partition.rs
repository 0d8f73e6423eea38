//! Greedy size-bounded grouping of work items.

use crate::manifest::{Partition, WorkItem};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Splits `items` into consecutive groups whose cumulative size stays at or
/// below `max_bytes`.
///
/// Order is preserved. A group closes when the next item would push it over
/// the bound. An item that alone exceeds the bound gets a group of its own.
/// Empty groups are never produced.
pub fn pack(items: Vec<WorkItem>, max_bytes: u64) -> Vec<Partition> {
    let mut groups = Vec::new();
    let mut current = Partition {
        size: 0,
        files: Vec::new(),
    };

    for item in items {
        if !current.files.is_empty() && current.size.saturating_add(item.size) > max_bytes {
            groups.push(std::mem::replace(
                &mut current,
                Partition {
                    size: 0,
                    files: Vec::new(),
                },
            ));
        }
        current.size = current.size.saturating_add(item.size);
        current.files.push(item);
    }
    if !current.files.is_empty() {
        groups.push(current);
    }

    tracing::debug!(groups = groups.len(), max_bytes, "packed partitions");
    groups
}
