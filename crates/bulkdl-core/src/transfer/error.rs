//! Transfer error type. One failed item never aborts its batch siblings.

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// curl reported a failure (connect, DNS, reset, timeout, truncated body).
    #[error("{0}")]
    Curl(#[from] curl::Error),

    /// The server answered with a non-success status; nothing was written.
    #[error("HTTP {0}")]
    Http(u32),

    /// A partial response started somewhere other than the requested offset.
    #[error("range mismatch: requested offset {requested}, server sent {served:?}")]
    RangeMismatch { requested: u64, served: Option<u64> },

    /// Local open, write or sync failed (disk full, permission denied).
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    /// The transfer finished but the file is not the expected length.
    #[error("length mismatch: expected {expected} bytes, file has {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    /// Stopped by an abort request (e.g. Ctrl-C); the partial file is kept.
    #[error("aborted")]
    Aborted,

    /// The worker thread panicked.
    #[error("transfer worker panicked")]
    Panicked,
}

impl TransferError {
    /// Remote refusals are usually an expired signature; worth calling out.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, TransferError::Http(403))
    }
}
