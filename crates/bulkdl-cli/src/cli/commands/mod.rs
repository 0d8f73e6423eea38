//! CLI command handlers, one per file.

mod run;
mod split;
mod status;

pub use run::run_transfer;
pub use split::run_split;
pub use status::run_status;

use anyhow::{Context, Result};
use bulkdl_core::completion::{self, CompletionTally, Layout};
use bulkdl_core::config::BulkConfig;
use bulkdl_core::manifest::{self, WorkItem};

use super::Target;

/// Loads the selected work items and classifies them against local state.
pub(super) fn prepare(
    cfg: &BulkConfig,
    target: &Target,
) -> Result<(Vec<WorkItem>, CompletionTally, Layout)> {
    let manifest = manifest::load(&target.manifest)
        .with_context(|| format!("load work items from {}", target.manifest.display()))?;
    let partitions = manifest.partition_count();
    if partitions > 0 {
        tracing::debug!(partitions, selected = ?target.partition, "partitioned work-item file");
    }
    let selection = manifest.select(target.partition)?;
    if selection.skipped_placeholders > 0 {
        tracing::debug!(
            skipped = selection.skipped_placeholders,
            "dropped directory placeholder keys"
        );
    }
    let layout = target.layout(cfg, selection.partition);
    let (pending, tally) =
        completion::classify_all(selection.items, &layout).context("map keys to local paths")?;
    tracing::info!(
        root = %layout.base().display(),
        partition = ?selection.partition,
        complete = tally.complete_count,
        incomplete = tally.incomplete_count,
        "classified work items"
    );
    Ok((pending, tally, layout))
}
