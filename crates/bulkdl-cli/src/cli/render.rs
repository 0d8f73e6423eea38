//! Console and JSON-lines renderers for scheduler status updates.

use std::io::Write;
use std::time::Duration;

use bulkdl_core::aggregate::GlobalTotals;
use bulkdl_core::completion::CompletionTally;
use bulkdl_core::scheduler::StatusUpdate;
use tokio::sync::mpsc::Receiver;

const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const UNITS: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// 1024-based size with one decimal: `512 B`, `1.5 kB`, `3.0 GB`.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    loop {
        value /= 1024.0;
        // Promote when rounding to one decimal would print 1024.0.
        if (value * 10.0).round() / 10.0 < 1024.0 || unit == UNITS.len() - 1 {
            break;
        }
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn tally_line(tally: &CompletionTally) -> String {
    format!(
        "complete: {} ({})  incomplete: {} ({})",
        tally.complete_count,
        human_size(tally.complete_bytes),
        tally.incomplete_count,
        human_size(tally.incomplete_bytes)
    )
}

#[derive(Debug, Default)]
struct ConsoleView {
    tally: CompletionTally,
    totals: GlobalTotals,
    batch: Option<(usize, usize)>,
    dirty: bool,
}

impl ConsoleView {
    fn apply(&mut self, update: StatusUpdate) {
        match update {
            StatusUpdate::Planned { tally, .. } | StatusUpdate::Finished { tally } => {
                self.tally = tally;
            }
            StatusUpdate::BatchStarted { index, batches, .. } => {
                self.batch = Some((index + 1, batches));
                self.totals = GlobalTotals::default();
            }
            StatusUpdate::Progress { totals, .. } => self.totals = totals,
            StatusUpdate::BatchSettled { tally, .. } => self.tally = tally,
        }
        self.dirty = true;
    }

    fn line(&self) -> String {
        let batch = match self.batch {
            Some((n, of)) => format!("batch {}/{}", n, of),
            None => "idle".to_string(),
        };
        format!(
            "[{}] {} | {:5.1}% {} / {} | {}/s | {} live",
            batch,
            tally_line(&self.tally),
            self.totals.progress_percent,
            human_size(self.totals.downloaded_bytes),
            human_size(self.totals.total_bytes),
            human_size(self.totals.speed as u64),
            self.totals.live
        )
    }
}

/// Redraws a single status line every 250 ms until the channel closes.
pub async fn console(mut rx: Receiver<StatusUpdate>) {
    let mut view = ConsoleView::default();
    let mut tick = tokio::time::interval(REDRAW_INTERVAL);
    let mut out = std::io::stdout();
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(StatusUpdate::Planned { tally, batches }) => {
                    let _ = writeln!(out, "{}  batches: {}", tally_line(&tally), batches);
                    view.apply(StatusUpdate::Planned { tally, batches });
                }
                Some(update) => view.apply(update),
                None => break,
            },
            _ = tick.tick() => {
                if view.dirty {
                    let _ = write!(out, "\r{}\x1b[K", view.line());
                    let _ = out.flush();
                    view.dirty = false;
                }
            }
        }
    }
    let _ = writeln!(out, "\r{}\x1b[K", view.line());
}

/// One JSON object per update on stdout.
pub async fn json_lines(mut rx: Receiver<StatusUpdate>) {
    let mut out = std::io::stdout();
    while let Some(update) = rx.recv().await {
        match serde_json::to_string(&update) {
            Ok(line) => {
                let _ = writeln!(out, "{}", line);
            }
            Err(e) => tracing::warn!("cannot encode status update: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1024), "1.0 kB");
        assert_eq!(human_size(1536), "1.5 kB");
        assert_eq!(human_size(1024 * 1024), "1.0 MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn human_size_promotes_near_boundary() {
        // 1023.99 kB would round to 1024.0 kB.
        assert_eq!(human_size(1024 * 1024 - 1), "1.0 MB");
    }

    #[test]
    fn tally_line_shows_both_sides() {
        let mut tally = CompletionTally::default();
        tally.credit_complete(2048);
        tally.credit_incomplete(100);
        assert_eq!(tally_line(&tally), "complete: 1 (2.0 kB)  incomplete: 1 (100 B)");
    }

    #[test]
    fn view_resets_totals_per_batch() {
        let mut view = ConsoleView::default();
        view.totals.downloaded_bytes = 500;
        view.apply(StatusUpdate::BatchStarted {
            index: 1,
            batches: 3,
            items: 10,
            bytes: 1000,
        });
        assert_eq!(view.batch, Some((2, 3)));
        assert_eq!(view.totals.downloaded_bytes, 0);
        assert!(view.line().starts_with("[batch 2/3]"));
    }
}
