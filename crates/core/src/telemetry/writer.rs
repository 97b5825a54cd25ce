use std::sync::Arc;

use tokio::sync::mpsc;

use super::{RunEventEnvelope, TelemetryHandle, TelemetrySink};

/// Background task that receives run events and hands them to a sink
pub struct TelemetryWriter {
    rx: mpsc::Receiver<RunEventEnvelope>,
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryWriter {
    pub fn new(rx: mpsc::Receiver<RunEventEnvelope>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self { rx, sink }
    }

    /// Run until every handle is dropped. Spawn with `tokio::spawn(writer.run())`.
    pub async fn run(mut self) {
        tracing::debug!("Telemetry writer started");

        while let Some(envelope) = self.rx.recv().await {
            if let Err(e) = self.sink.record(&envelope) {
                tracing::warn!(
                    event_type = envelope.event.event_type(),
                    "Failed to record run event: {}",
                    e
                );
            }
        }

        tracing::debug!("Telemetry writer shutting down");
    }
}

/// Create a handle/writer pair sharing a channel of `buffer_size` events.
pub fn create_telemetry_system(
    sink: Arc<dyn TelemetrySink>,
    buffer_size: usize,
) -> (TelemetryHandle, TelemetryWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (TelemetryHandle::new(tx), TelemetryWriter::new(rx, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionStrategy;
    use crate::format::{MediaFormat, OperationKind};
    use crate::telemetry::{RunEvent, RunOutcome, TelemetryError};
    use crate::testing::RecordingSink;
    use uuid::Uuid;

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn record(&self, _: &RunEventEnvelope) -> Result<(), TelemetryError> {
            Err(TelemetryError::Unavailable("collector down".to_string()))
        }
    }

    fn events(run_id: Uuid) -> [RunEvent; 2] {
        [
            RunEvent::Begin {
                run_id,
                operation: OperationKind::TimeBasedMedia,
                from: MediaFormat::Mp4,
                to: MediaFormat::Webm,
                strategy: ExecutionStrategy::Remote,
            },
            RunEvent::Finish {
                run_id,
                outcome: RunOutcome::Succeeded,
                duration_ms: 5,
                attempts: 1,
                strategy: ExecutionStrategy::Remote,
                error: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_writer_forwards_in_order() {
        let sink = Arc::new(RecordingSink::new());
        let (handle, writer) = create_telemetry_system(sink.clone(), 10);
        let writer_handle = tokio::spawn(writer.run());

        let run_id = Uuid::new_v4();
        for event in events(run_id) {
            handle.emit(event).await;
        }
        drop(handle);
        writer_handle.await.unwrap();

        let recorded = sink.events();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].event_type(), "run_begin");
        assert_eq!(recorded[1].event_type(), "run_finish");
        assert!(recorded.iter().all(|e| e.run_id() == run_id));
    }

    #[tokio::test]
    async fn test_writer_continues_on_sink_failure() {
        let (handle, writer) = create_telemetry_system(Arc::new(FailingSink), 10);
        let writer_handle = tokio::spawn(writer.run());

        for event in events(Uuid::new_v4()) {
            handle.emit(event).await;
        }
        drop(handle);

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), writer_handle).await;
        assert!(result.is_ok());
    }
}
