//! curl `Handler` for one transfer: checks the response before the first
//! body byte, appends to the destination, and emits a sample per chunk.

use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use super::error::TransferError;
use super::headers::{parse_content_length, parse_content_range_start, parse_http_status};
use super::speed::SpeedMeter;
use super::ProgressSample;
use crate::storage::ResumeFile;

pub(super) struct TransferHandler {
    pub(super) id: usize,
    pub(super) expected: u64,
    /// Offset sent in the Range header (0 = full request).
    pub(super) requested_offset: u64,
    pub(super) file: ResumeFile,
    /// Bytes already on disk when this session's body started.
    pub(super) baseline: u64,
    /// Bytes received in this session.
    pub(super) received: u64,
    pub(super) response_headers: Vec<String>,
    /// None = not yet checked; Some(false) = rejected, write nothing.
    pub(super) accepted: Option<bool>,
    pub(super) failure: Option<TransferError>,
    meter: SpeedMeter,
    events: UnboundedSender<ProgressSample>,
    abort: Option<Arc<AtomicBool>>,
}

impl TransferHandler {
    pub(super) fn new(
        id: usize,
        expected: u64,
        file: ResumeFile,
        events: UnboundedSender<ProgressSample>,
        abort: Option<Arc<AtomicBool>>,
    ) -> Self {
        let offset = file.offset();
        Self {
            id,
            expected,
            requested_offset: offset,
            file,
            baseline: offset,
            received: 0,
            response_headers: Vec::new(),
            accepted: None,
            failure: None,
            meter: SpeedMeter::new(Instant::now()),
            events,
            abort,
        }
    }

    fn abort_requested(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|a| a.load(Ordering::Relaxed))
    }

    /// Decides whether the body may be written. A plain 200 on a resume
    /// request means the server ignored Range, so the file restarts at 0.
    pub(super) fn accept_response(&mut self) -> bool {
        let status = parse_http_status(&self.response_headers).unwrap_or(200);
        tracing::debug!(
            status,
            content_length = ?parse_content_length(&self.response_headers),
            requested_offset = self.requested_offset,
            "response headers"
        );
        match status {
            206 => {
                let served = parse_content_range_start(&self.response_headers);
                if served == Some(self.requested_offset) {
                    true
                } else {
                    self.failure = Some(TransferError::RangeMismatch {
                        requested: self.requested_offset,
                        served,
                    });
                    false
                }
            }
            200..=299 => {
                if self.file.offset() > 0 {
                    tracing::info!(
                        path = %self.file.path().display(),
                        offset = self.file.offset(),
                        "server ignored Range, restarting from zero"
                    );
                    if let Err(e) = self.file.restart() {
                        self.failure = Some(TransferError::Storage(e));
                        return false;
                    }
                    self.baseline = 0;
                }
                true
            }
            code => {
                self.failure = Some(TransferError::Http(code));
                false
            }
        }
    }

    pub(super) fn emit(&mut self, chunk_len: u64) {
        let speed = self.meter.record(chunk_len, Instant::now());
        let downloaded = self.baseline + self.received;
        let _ = self
            .events
            .send(ProgressSample::new(self.id, downloaded, self.expected, speed));
    }
}

impl curl::easy::Handler for TransferHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.response_headers.clear();
            }
            if !line.is_empty() {
                self.response_headers.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        if self.abort_requested() {
            self.failure = Some(TransferError::Aborted);
            return Ok(0);
        }
        if self.accepted.is_none() {
            let ok = self.accept_response();
            self.accepted = Some(ok);
        }
        if self.accepted != Some(true) {
            return Ok(0);
        }
        if let Err(e) = self.file.write_all(data) {
            self.failure = Some(TransferError::Storage(e));
            return Ok(0);
        }
        let n = data.len();
        self.received += n as u64;
        self.emit(n as u64);
        Ok(n)
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        if self.abort_requested() {
            self.failure = Some(TransferError::Aborted);
            return false;
        }
        true
    }
}
