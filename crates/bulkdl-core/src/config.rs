use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::DEFAULT_WIDTH;
use crate::scheduler::RunOptions;
use crate::transfer::{OversizePolicy, StallLimit, TransferOptions};

/// Environment variable that overrides `concurrency`.
pub const CONCURRENCY_ENV: &str = "BULKDL_CONCURRENCY";

/// Global configuration loaded from `~/.config/bulkdl/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Transfers per batch.
    pub concurrency: usize,
    /// Destination root; relative paths resolve against the working directory.
    pub download_root: PathBuf,
    /// Place partition `i` under `<root>/part-<i>`.
    pub partition_subdir: bool,
    /// What to do when a local file is larger than its object.
    pub oversize: OversizePolicy,
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than this many bytes/s for `low_speed_time_secs`.
    /// Both must be set to take effect.
    pub low_speed_limit_bytes: Option<u32>,
    pub low_speed_time_secs: Option<u64>,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_WIDTH,
            download_root: PathBuf::from("downloads"),
            partition_subdir: false,
            oversize: OversizePolicy::Restart,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: None,
            low_speed_time_secs: None,
        }
    }
}

impl BulkConfig {
    /// Concurrency after the `BULKDL_CONCURRENCY` override, never below 1.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_with(std::env::var(CONCURRENCY_ENV).ok().as_deref())
    }

    fn concurrency_with(&self, env: Option<&str>) -> usize {
        let from_env = env.and_then(|v| match v.trim().parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!(value = v, "ignoring unparsable {}", CONCURRENCY_ENV);
                None
            }
        });
        from_env.unwrap_or(self.concurrency).max(1)
    }

    pub fn stall_limit(&self) -> Option<StallLimit> {
        match (self.low_speed_limit_bytes, self.low_speed_time_secs) {
            (Some(bytes_per_sec), Some(secs)) if bytes_per_sec > 0 && secs > 0 => Some(StallLimit {
                bytes_per_sec,
                window: Duration::from_secs(secs),
            }),
            _ => None,
        }
    }

    pub fn transfer_options(&self, abort: Option<Arc<AtomicBool>>) -> TransferOptions {
        TransferOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            stall: self.stall_limit(),
            oversize: self.oversize,
            abort,
        }
    }

    pub fn run_options(&self, abort: Option<Arc<AtomicBool>>) -> RunOptions {
        RunOptions {
            width: self.effective_concurrency(),
            transfer: self.transfer_options(abort),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BulkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BulkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BulkConfig = toml::from_str(&data)?;
    Ok(cfg)
}
