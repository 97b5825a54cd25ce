use serde::Serialize;
use std::time::{Duration, Instant};

/// Running statistics for a streamed download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub bytes_received: u64,
    /// Declared total length, when the response carried one.
    pub total_bytes: Option<u64>,
    pub bytes_per_sec: f64,
    pub eta_secs: Option<f64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f32> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.bytes_received as f64 / total as f64 * 100.0).min(100.0) as f32)
    }
}

/// Accumulates received bytes and derives rate and ETA from elapsed time.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    received: u64,
    total: Option<u64>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            received: 0,
            total,
        }
    }

    pub fn advance(&mut self, bytes: usize) -> DownloadProgress {
        self.received += bytes as u64;
        self.snapshot(self.started.elapsed())
    }

    fn snapshot(&self, elapsed: Duration) -> DownloadProgress {
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            self.received as f64 / secs
        } else {
            0.0
        };
        let eta_secs = self
            .total
            .filter(|_| bytes_per_sec > 0.0)
            .map(|total| total.saturating_sub(self.received) as f64 / bytes_per_sec);

        DownloadProgress {
            bytes_received: self.received,
            total_bytes: self.total,
            bytes_per_sec,
            eta_secs,
        }
    }
}
