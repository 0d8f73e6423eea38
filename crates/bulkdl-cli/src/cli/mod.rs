//! CLI for the bulkdl transfer engine.

mod commands;
mod render;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use bulkdl_core::completion::Layout;
use bulkdl_core::config::{self, BulkConfig};
use std::path::PathBuf;

use commands::{run_split, run_status, run_transfer};

/// Top-level CLI for bulkdl.
#[derive(Debug, Parser)]
#[command(name = "bulkdl")]
#[command(about = "bulkdl: parallel resumable bulk download of pre-signed object URLs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which items to work on and where they live locally.
#[derive(Debug, Args)]
pub struct Target {
    /// Work-item file (JSON array of items, or of partitions).
    pub manifest: PathBuf,

    /// Zero-based partition to process (required for partitioned files).
    #[arg(long, short = 'p', value_name = "INDEX")]
    pub partition: Option<usize>,

    /// Destination root (overrides `download_root` from config).
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Place partition N under `<dest>/part-N`.
    #[arg(long)]
    pub partition_subdir: bool,
}

impl Target {
    pub fn layout(&self, cfg: &BulkConfig, partition: Option<usize>) -> Layout {
        let root = self
            .dest
            .clone()
            .unwrap_or_else(|| cfg.download_root.clone());
        let layout = Layout::new(root);
        match partition {
            Some(index) if self.partition_subdir || cfg.partition_subdir => {
                layout.with_partition(index)
            }
            _ => layout,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every incomplete item, batch by batch.
    Run {
        #[command(flatten)]
        target: Target,

        /// Transfers per batch (overrides config and BULKDL_CONCURRENCY).
        #[arg(long, short = 'c', value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: Option<u64>,

        /// Emit status updates as JSON lines instead of the console view.
        #[arg(long)]
        json: bool,
    },

    /// Report what is complete locally without downloading anything.
    Status {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        json: bool,
    },

    /// Group a flat work-item file into size-bounded partitions.
    Split {
        /// Input work-item file.
        manifest: PathBuf,

        /// Upper bound per partition in GiB.
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        max_gib: u64,

        /// Where to write the partitioned file.
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                target,
                concurrency,
                json,
            } => run_transfer(&cfg, &target, concurrency.map(|n| n as usize), json).await?,
            CliCommand::Status { target, json } => run_status(&cfg, &target, json)?,
            CliCommand::Split {
                manifest,
                max_gib,
                output,
            } => run_split(&manifest, max_gib, &output)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
