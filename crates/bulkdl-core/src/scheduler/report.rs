//! Run outcome.

use crate::completion::CompletionTally;

/// An item that did not complete in this run; a later run retries it.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub key: String,
    pub size: u64,
    pub batch: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub tally: CompletionTally,
    pub failures: Vec<FailedItem>,
    pub batches_run: usize,
}

impl RunReport {
    /// True when nothing is left incomplete.
    pub fn is_complete(&self) -> bool {
        self.tally.is_done()
    }
}
