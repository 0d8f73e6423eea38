//! Top-level run loop: plan batches, execute them in order, stop when done.

use anyhow::Result;
use std::sync::atomic::Ordering;

use crate::aggregate::Aggregator;
use crate::batch::{self, DEFAULT_WIDTH};
use crate::completion::{CompletionTally, Layout};
use crate::manifest::WorkItem;
use crate::transfer::TransferOptions;

use super::execute::run_batch;
use super::report::RunReport;
use super::status::{self, StatusUpdate};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Transfers per batch (concurrency width).
    pub width: usize,
    pub transfer: TransferOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            transfer: TransferOptions::default(),
        }
    }
}

/// Transfers the incomplete `items` batch by batch.
///
/// `tally` comes from classification and must already count `items` as
/// incomplete. Returns early when nothing is outstanding. Failed items
/// stay incomplete and are listed in the report; they never stop the run.
/// An abort request stops scheduling after the current batch settles.
pub async fn run(
    items: Vec<WorkItem>,
    tally: CompletionTally,
    layout: &Layout,
    opts: &RunOptions,
    status_tx: Option<tokio::sync::mpsc::Sender<StatusUpdate>>,
) -> Result<RunReport> {
    let tx = status_tx.as_ref();
    let mut report = RunReport {
        tally,
        ..RunReport::default()
    };
    let batches = batch::plan(items, opts.width);
    status::send(
        tx,
        StatusUpdate::Planned {
            tally,
            batches: batches.len(),
        },
    )
    .await;

    if report.tally.is_done() {
        tracing::info!(
            complete = report.tally.complete_count,
            "all items already complete"
        );
        status::send(tx, StatusUpdate::Finished { tally: report.tally }).await;
        return Ok(report);
    }

    tracing::info!(
        incomplete = report.tally.incomplete_count,
        bytes = report.tally.incomplete_bytes,
        batches = batches.len(),
        width = opts.width,
        "starting run"
    );

    let mut aggregator = Aggregator::new();
    for batch in &batches {
        if opts
            .transfer
            .abort
            .as_ref()
            .is_some_and(|a| a.load(Ordering::Relaxed))
        {
            tracing::info!(batch = batch.index, "abort requested, not starting further batches");
            break;
        }
        run_batch(batch, batches.len(), layout, opts, &mut aggregator, &mut report, tx).await?;
        report.batches_run += 1;
        if report.tally.is_done() {
            tracing::info!(complete = report.tally.complete_count, "all items complete");
            break;
        }
    }
    aggregator.clear();

    if !report.failures.is_empty() {
        tracing::warn!(
            failed = report.failures.len(),
            incomplete = report.tally.incomplete_count,
            "run finished with incomplete items; rerun to resume them"
        );
    }
    status::send(tx, StatusUpdate::Finished { tally: report.tally }).await;
    Ok(report)
}
