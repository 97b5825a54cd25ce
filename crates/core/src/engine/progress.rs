//! Progress reporting for conversion attempts.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::strategy::ExecutionStrategy;

/// A progress update forwarded to the caller.
///
/// `strategy` and `attempt` form the status: a new attempt under a different
/// strategy starts again from 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub strategy: ExecutionStrategy,
    pub attempt: u32,
    pub progress_percent: f32,
    pub message: Option<String>,
}

/// Callback handed to codecs. Values are percentages in 0..=100.
pub type ProgressFn<'a> = dyn Fn(f32, Option<&str>) + Send + Sync + 'a;

/// Per-attempt progress forwarder that never lets the reported value go down.
pub struct ProgressReporter {
    strategy: ExecutionStrategy,
    attempt: u32,
    last: Mutex<f32>,
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(
        strategy: ExecutionStrategy,
        attempt: u32,
        tx: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Self {
        Self {
            strategy,
            attempt,
            last: Mutex::new(0.0),
            tx,
        }
    }

    /// Emits the 0% event that opens an attempt.
    pub fn start(&self) {
        self.send(0.0, Some("started"));
    }

    pub fn report(&self, percent: f32, message: Option<&str>) {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let value = {
            let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
            if percent > *last {
                *last = percent;
            }
            *last
        };
        self.send(value, message);
    }

    pub fn finish(&self) {
        self.report(100.0, Some("done"));
    }

    fn send(&self, progress_percent: f32, message: Option<&str>) {
        if let Some(tx) = &self.tx {
            // Slow consumers miss intermediate updates.
            let _ = tx.try_send(ProgressEvent {
                strategy: self.strategy,
                attempt: self.attempt,
                progress_percent,
                message: message.map(str::to_string),
            });
        }
    }
}
