use std::sync::Mutex;

use crate::telemetry::{RunEvent, RunEventEnvelope, TelemetryError, TelemetrySink};

/// Telemetry sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, envelope: &RunEventEnvelope) -> Result<(), TelemetryError> {
        self.events.lock().unwrap().push(envelope.event.clone());
        Ok(())
    }
}
