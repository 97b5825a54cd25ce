use thiserror::Error;

use super::{RunEvent, RunEventEnvelope};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for run events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, envelope: &RunEventEnvelope) -> Result<(), TelemetryError>;
}

/// Writes run events to the `mediaforge::telemetry` tracing target.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, envelope: &RunEventEnvelope) -> Result<(), TelemetryError> {
        match &envelope.event {
            RunEvent::Begin {
                run_id,
                operation,
                from,
                to,
                strategy,
            } => tracing::info!(
                target: "mediaforge::telemetry",
                %run_id,
                %operation,
                %from,
                %to,
                %strategy,
                "run_begin"
            ),
            RunEvent::Finish {
                run_id,
                outcome,
                duration_ms,
                attempts,
                strategy,
                error,
            } => tracing::info!(
                target: "mediaforge::telemetry",
                %run_id,
                ?outcome,
                duration_ms,
                attempts,
                %strategy,
                error = error.as_deref().unwrap_or(""),
                "run_finish"
            ),
        }
        Ok(())
    }
}
