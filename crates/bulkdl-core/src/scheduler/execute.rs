//! Execute one batch: create directories, fan out transfers, fan in results.

use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::aggregate::Aggregator;
use crate::batch::{self, Batch};
use crate::completion::Layout;
use crate::manifest::WorkItem;
use crate::transfer::{self, ProgressSample, TransferError, TransferOutcome};

use super::report::{FailedItem, RunReport};
use super::run::RunOptions;
use super::status::{self, StatusUpdate};

type Settled = (WorkItem, Result<TransferOutcome, TransferError>);

/// Runs every item of `batch` concurrently and returns once all have
/// settled. Tally and failures are recorded into `report`.
pub(super) async fn run_batch(
    batch: &Batch,
    batches: usize,
    layout: &Layout,
    opts: &RunOptions,
    aggregator: &mut Aggregator,
    report: &mut RunReport,
    status_tx: Option<&mpsc::Sender<StatusUpdate>>,
) -> Result<()> {
    aggregator.clear();
    status::send(
        status_tx,
        StatusUpdate::BatchStarted {
            index: batch.index,
            batches,
            items: batch.len(),
            bytes: batch.total_bytes(),
        },
    )
    .await;
    tracing::info!(
        batch = batch.index + 1,
        of = batches,
        items = batch.len(),
        bytes = batch.total_bytes(),
        "batch started"
    );

    let dirs = batch
        .directories(layout)
        .context("derive destination directories")?;
    if let Err(e) = batch::create_directories(&dirs).await {
        tracing::error!(batch = batch.index + 1, error = %e, "cannot create directories, skipping batch");
        for item in &batch.items {
            report.failures.push(FailedItem {
                key: item.key.clone(),
                size: item.size,
                batch: batch.index,
                error: format!("create directories: {}", e),
            });
        }
        status::send(
            status_tx,
            StatusUpdate::BatchSettled {
                index: batch.index,
                tally: report.tally,
                failed: batch.len(),
            },
        )
        .await;
        return Ok(());
    }

    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<ProgressSample>();
    let mut workers: JoinSet<Settled> = JoinSet::new();
    for (pos, item) in batch.items.iter().enumerate() {
        let id = pos + 1;
        let destination = layout
            .destination(&item.key)
            .with_context(|| format!("destination for {}", item.key))?;
        aggregator.register(id, item.size);

        let item = item.clone();
        let tx = sample_tx.clone();
        let transfer_opts = opts.transfer.clone();
        workers.spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                transfer::transfer(&item, &destination, id, &transfer_opts, &tx)
            }))
            .unwrap_or(Err(TransferError::Panicked));
            (item, result)
        });
    }
    drop(sample_tx);

    let mut failed = 0usize;
    loop {
        tokio::select! {
            biased;
            Some(sample) = sample_rx.recv() => {
                forward(aggregator, sample, status_tx).await;
            }
            joined = workers.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                let (item, result) = joined.context("transfer task join")?;
                if !settle(batch.index, item, result, report) {
                    failed += 1;
                }
            }
        }
    }
    while let Ok(sample) = sample_rx.try_recv() {
        forward(aggregator, sample, status_tx).await;
    }

    tracing::info!(
        batch = batch.index + 1,
        failed,
        complete = report.tally.complete_count,
        incomplete = report.tally.incomplete_count,
        "batch settled"
    );
    status::send(
        status_tx,
        StatusUpdate::BatchSettled {
            index: batch.index,
            tally: report.tally,
            failed,
        },
    )
    .await;
    Ok(())
}

async fn forward(
    aggregator: &mut Aggregator,
    sample: ProgressSample,
    status_tx: Option<&mpsc::Sender<StatusUpdate>>,
) {
    let totals = aggregator.update(&sample);
    status::send(status_tx, StatusUpdate::Progress { sample, totals }).await;
}

/// Records one settled transfer. Returns true on success.
fn settle(
    batch: usize,
    item: WorkItem,
    result: Result<TransferOutcome, TransferError>,
    report: &mut RunReport,
) -> bool {
    match result {
        Ok(outcome) => {
            report.tally.mark_transferred(item.size);
            tracing::info!(
                key = %item.key,
                resumed_from = outcome.resumed_from,
                received = outcome.received,
                "transfer complete"
            );
            true
        }
        Err(e) => {
            if e.is_forbidden() {
                tracing::warn!(key = %item.key, error = %e, "transfer refused; the signed URL may have expired");
            } else {
                tracing::warn!(key = %item.key, error = %e, "transfer failed");
            }
            report.failures.push(FailedItem {
                key: item.key,
                size: item.size,
                batch,
                error: e.to_string(),
            });
            false
        }
    }
}
