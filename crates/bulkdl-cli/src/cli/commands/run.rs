//! `bulkdl run` – download every incomplete item of the selected work list.

use anyhow::{bail, Result};
use bulkdl_core::config::BulkConfig;
use bulkdl_core::scheduler::{self, StatusUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::render::{self, human_size, tally_line};
use crate::cli::Target;

const STATUS_CAPACITY: usize = 1024;

pub async fn run_transfer(
    cfg: &BulkConfig,
    target: &Target,
    concurrency: Option<usize>,
    json: bool,
) -> Result<()> {
    let (pending, tally, layout) = super::prepare(cfg, target)?;

    let abort = Arc::new(AtomicBool::new(false));
    let interrupt = Arc::clone(&abort);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.store(true, Ordering::Relaxed);
            eprintln!("\ninterrupted: stopping transfers, partial files are kept");
        }
    });

    let mut opts = cfg.run_options(Some(abort));
    if let Some(n) = concurrency {
        opts.width = n.max(1);
    }

    let (status_tx, status_rx) = tokio::sync::mpsc::channel::<StatusUpdate>(STATUS_CAPACITY);
    let renderer = if json {
        tokio::spawn(render::json_lines(status_rx))
    } else {
        tokio::spawn(render::console(status_rx))
    };

    let report = scheduler::run(pending, tally, &layout, &opts, Some(status_tx)).await;
    let _ = renderer.await;
    let report = report?;

    for failure in &report.failures {
        eprintln!(
            "failed: {} ({}) batch {}: {}",
            failure.key,
            human_size(failure.size),
            failure.batch + 1,
            failure.error
        );
    }
    if !json {
        println!("{}", tally_line(&report.tally));
    }

    if !report.is_complete() {
        bail!(
            "{} item(s) incomplete ({}); rerun to resume",
            report.tally.incomplete_count,
            human_size(report.tally.incomplete_bytes)
        );
    }
    tracing::info!(
        complete = report.tally.complete_count,
        batches = report.batches_run,
        "run complete"
    );
    Ok(())
}
