//! `bulkdl status` – classify work items against local files, no network.

use anyhow::Result;
use bulkdl_core::config::BulkConfig;

use crate::cli::render::{human_size, tally_line};
use crate::cli::Target;

pub fn run_status(cfg: &BulkConfig, target: &Target, json: bool) -> Result<()> {
    let (_, tally, layout) = super::prepare(cfg, target)?;
    if json {
        println!("{}", serde_json::to_string(&tally)?);
        return Ok(());
    }
    println!("destination: {}", layout.base().display());
    println!("{}", tally_line(&tally));
    println!(
        "total: {} item(s), {}",
        tally.total_count(),
        human_size(tally.total_bytes())
    );
    Ok(())
}
