//! Instantaneous speed estimate, resampled once per interval.

use std::time::{Duration, Instant};

/// Reports `bytes since last sample / elapsed seconds`, recomputed when at
/// least one interval has passed. Between samples the last value is held.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    interval: Duration,
    window_start: Instant,
    window_bytes: u64,
    current: f64,
}

impl SpeedMeter {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self::with_interval(now, Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            window_start: now,
            window_bytes: 0,
            current: 0.0,
        }
    }

    /// Accounts `bytes` received at `now` and returns the current speed.
    pub fn record(&mut self, bytes: u64, now: Instant) -> f64 {
        self.window_bytes += bytes;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.interval {
            self.current = self.window_bytes as f64 / elapsed.as_secs_f64();
            self.window_start = now;
            self.window_bytes = 0;
        }
        self.current
    }
}
