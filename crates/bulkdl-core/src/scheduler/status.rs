//! Status messages for renderers (console, JSON lines, anything else).

use serde::Serialize;

use crate::aggregate::GlobalTotals;
use crate::completion::CompletionTally;
use crate::transfer::ProgressSample;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// Sent once before the first batch.
    Planned {
        tally: CompletionTally,
        batches: usize,
    },
    BatchStarted {
        index: usize,
        batches: usize,
        items: usize,
        bytes: u64,
    },
    Progress {
        sample: ProgressSample,
        totals: GlobalTotals,
    },
    BatchSettled {
        index: usize,
        tally: CompletionTally,
        failed: usize,
    },
    Finished {
        tally: CompletionTally,
    },
}

/// Progress is best effort (dropped when the renderer lags); boundaries wait.
pub(super) async fn send(tx: Option<&tokio::sync::mpsc::Sender<StatusUpdate>>, update: StatusUpdate) {
    let Some(tx) = tx else {
        return;
    };
    match update {
        StatusUpdate::Progress { .. } => {
            let _ = tx.try_send(update);
        }
        _ => {
            let _ = tx.send(update).await;
        }
    }
}
