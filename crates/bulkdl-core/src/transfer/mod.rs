//! Transfer worker: one resumable streaming GET per work item.
//!
//! The destination is opened for append. With `L` bytes already present
//! the request carries `Range: bytes=L-`; otherwise it fetches the whole
//! object. The body is written to disk chunk by chunk as it arrives and a
//! `ProgressSample` is sent for every chunk. No retry happens here.
//!
//! Samples always report against the work item's size, with `L` credited
//! up front, so percentages do not jump when a transfer resumes.

mod error;
mod handler;
mod headers;
mod speed;

pub use error::TransferError;
pub use speed::SpeedMeter;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::manifest::WorkItem;
use crate::storage::ResumeFile;

use self::handler::TransferHandler;

/// One progress message from a worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    /// 1-based position within the batch.
    pub id: usize,
    /// Percent of `total_size` present locally.
    pub progress: f64,
    pub total_size: u64,
    pub downloaded_size: u64,
    /// Bytes per second over the last sampling interval.
    pub speed: f64,
}

impl ProgressSample {
    pub fn new(id: usize, downloaded_size: u64, total_size: u64, speed: f64) -> Self {
        let progress = if total_size == 0 {
            0.0
        } else {
            downloaded_size as f64 / total_size as f64 * 100.0
        };
        Self {
            id,
            progress,
            total_size,
            downloaded_size,
            speed,
        }
    }
}

/// What to do when the local file is already longer than the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Truncate and download the whole object again.
    #[default]
    Restart,
    /// Request the suffix from the local length anyway.
    Resume,
}

/// Abort the transfer when throughput stays below `bytes_per_sec` for `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallLimit {
    pub bytes_per_sec: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// None = no stall detection; a stuck connection holds its slot.
    pub stall: Option<StallLimit>,
    pub oversize: OversizePolicy,
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            stall: None,
            oversize: OversizePolicy::default(),
            abort: None,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Offset this session's body started at.
    pub resumed_from: u64,
    /// Bytes received in this session.
    pub received: u64,
}

/// Downloads `item` into `destination`, resuming from any existing bytes.
///
/// Blocking: run it on a blocking thread. Samples go to `events`; a closed
/// receiver does not stop the transfer.
pub fn transfer(
    item: &WorkItem,
    destination: &Path,
    id: usize,
    opts: &TransferOptions,
    events: &UnboundedSender<ProgressSample>,
) -> Result<TransferOutcome, TransferError> {
    let mut file = ResumeFile::open(destination)?;
    if file.offset() > item.size && opts.oversize == OversizePolicy::Restart {
        tracing::warn!(
            key = %item.key,
            local = file.offset(),
            expected = item.size,
            "local file larger than object, restarting"
        );
        file.restart()?;
    }
    let offset = file.offset();

    let mut handler = TransferHandler::new(id, item.size, file, events.clone(), opts.abort.clone());
    handler.emit(0);

    let mut easy = curl::easy::Easy2::new(handler);
    easy.url(&item.signed_url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    if let Some(stall) = opts.stall {
        easy.low_speed_limit(stall.bytes_per_sec)?;
        easy.low_speed_time(stall.window)?;
    }
    easy.progress(true)?;
    if offset > 0 {
        easy.range(&format!("{}-", offset))?;
    }

    tracing::debug!(
        key = %item.key,
        url = %redact_url(&item.signed_url),
        offset,
        "transfer started"
    );

    let performed = easy.perform();
    let code = easy.response_code().unwrap_or(0);
    let handler = easy.get_mut();

    if let Some(err) = handler.failure.take() {
        return Err(err);
    }
    performed?;

    // Empty bodies never reach `write`, so check the response here.
    if handler.accepted.is_none() {
        let ok = handler.accept_response();
        handler.accepted = Some(ok);
        if !ok {
            return Err(handler.failure.take().unwrap_or(TransferError::Http(code)));
        }
    }

    handler.file.sync()?;
    let actual = handler.file.len_on_disk()?;
    if actual != item.size {
        return Err(TransferError::LengthMismatch {
            expected: item.size,
            actual,
        });
    }
    handler.emit(0);

    Ok(TransferOutcome {
        resumed_from: handler.baseline,
        received: handler.received,
    })
}

/// Scheme, host and path of a signed URL; the query carries the signature.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
