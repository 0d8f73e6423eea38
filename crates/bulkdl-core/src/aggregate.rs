//! Progress aggregation over the live transfers of the current batch.
//!
//! Totals are recomputed from the live map on every update, so there is no
//! incremental drift. The map is at most one batch wide.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::transfer::ProgressSample;

/// Latest known state of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferState {
    pub id: usize,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub progress_percent: f64,
    pub speed_bytes_per_sec: f64,
}

/// Global view derived from all live transfer states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTotals {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// 0 when `total_bytes` is 0.
    pub progress_percent: f64,
    /// Mean of the live transfers' speeds.
    pub speed: f64,
    pub live: usize,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    live: BTreeMap<usize, TransferState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a not-yet-started transfer with nothing downloaded.
    pub fn register(&mut self, id: usize, total_bytes: u64) {
        self.live.insert(
            id,
            TransferState {
                id,
                downloaded_bytes: 0,
                total_bytes,
                progress_percent: 0.0,
                speed_bytes_per_sec: 0.0,
            },
        );
    }

    /// Replaces the state of `sample.id` and returns fresh totals.
    /// Downloaded bytes are capped at the item's total.
    pub fn update(&mut self, sample: &ProgressSample) -> GlobalTotals {
        let downloaded = sample.downloaded_size.min(sample.total_size);
        self.live.insert(
            sample.id,
            TransferState {
                id: sample.id,
                downloaded_bytes: downloaded,
                total_bytes: sample.total_size,
                progress_percent: sample.progress.clamp(0.0, 100.0),
                speed_bytes_per_sec: sample.speed,
            },
        );
        self.totals()
    }

    /// Drops all live states (called at each batch boundary).
    pub fn clear(&mut self) {
        self.live.clear();
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn totals(&self) -> GlobalTotals {
        let live = self.live.len();
        let downloaded_bytes: u64 = self.live.values().map(|s| s.downloaded_bytes).sum();
        let total_bytes: u64 = self.live.values().map(|s| s.total_bytes).sum();
        let progress_percent = if total_bytes == 0 {
            0.0
        } else {
            downloaded_bytes as f64 / total_bytes as f64 * 100.0
        };
        let speed = if live == 0 {
            0.0
        } else {
            self.live.values().map(|s| s.speed_bytes_per_sec).sum::<f64>() / live as f64
        };
        GlobalTotals {
            downloaded_bytes,
            total_bytes,
            progress_percent,
            speed,
            live,
        }
    }
}
