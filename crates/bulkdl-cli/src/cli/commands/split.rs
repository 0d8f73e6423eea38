//! `bulkdl split` – group a work-item file into size-bounded partitions.

use anyhow::{Context, Result};
use bulkdl_core::manifest::{self, Manifest};
use bulkdl_core::partition::{self, GIB};
use std::path::Path;

use crate::cli::render::human_size;

pub fn run_split(input: &Path, max_gib: u64, output: &Path) -> Result<()> {
    let manifest = manifest::load(input)
        .with_context(|| format!("load work items from {}", input.display()))?;
    let items: Vec<_> = match manifest {
        Manifest::Flat(items) => items,
        Manifest::Partitioned(parts) => parts.into_iter().flat_map(|p| p.files).collect(),
    }
    .into_iter()
    .filter(|i| !i.is_directory_placeholder())
    .collect();

    let max_bytes = max_gib.saturating_mul(GIB);
    let partitions = partition::pack(items, max_bytes);
    manifest::write_partitions(output, &partitions)?;

    for (index, p) in partitions.iter().enumerate() {
        println!(
            "part {:>3}: {:>6} item(s)  {}",
            index,
            p.files.len(),
            human_size(p.size)
        );
    }
    println!(
        "wrote {} partition(s) to {}",
        partitions.len(),
        output.display()
    );
    Ok(())
}
