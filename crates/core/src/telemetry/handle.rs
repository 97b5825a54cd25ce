use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::RunEvent;

/// Envelope wrapping a run event with metadata
#[derive(Debug, Clone)]
pub struct RunEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

/// Handle for emitting run events
///
/// Cheaply cloneable. Events go through a bounded channel to the
/// [`TelemetryWriter`](super::TelemetryWriter).
#[derive(Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<RunEventEnvelope>,
}

impl TelemetryHandle {
    pub fn new(tx: mpsc::Sender<RunEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit a run event, waiting for channel capacity.
    ///
    /// A closed channel is logged; the caller is never failed.
    pub async fn emit(&self, event: RunEvent) {
        let envelope = RunEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::warn!("Failed to emit run event: {}", e);
        }
    }

    /// Try to emit without waiting. Returns false if the event was dropped.
    pub fn try_emit(&self, event: RunEvent) -> bool {
        let envelope = RunEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to emit run event: {}", e);
                false
            }
        }
    }
}
