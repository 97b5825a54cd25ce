//! Client-side conversion engine.
//!
//! A job's first venue comes from [`resolve`] over the process-wide
//! [`CapabilitySnapshot`]. Failed attempts go through the
//! [`FallbackController`], which may retry the same payload in another venue:
//!
//! - local-isolated: a worker thread behind the [`IsolatedChannel`]
//! - local-degraded: the same codecs on the calling task, no fault containment
//! - remote: the server's transcoding services

pub mod capabilities;
mod channel;
pub mod codec;
mod config;
mod error;
mod fallback;
mod job;
mod progress;
mod remote;
mod strategy;

pub use capabilities::{CapabilityProbe, CapabilitySnapshot};
pub use channel::{IsolatedChannel, WorkerMessage, WorkerRequest};
pub use codec::{CodecRegistry, CodecRequest, LocalCodec};
pub use config::EngineConfig;
pub use error::{ConversionError, ErrorKind};
pub use fallback::{FallbackController, FallbackState};
pub use job::{ConversionJob, ConversionResult};
pub use progress::{ProgressEvent, ProgressFn, ProgressReporter};
pub use remote::RemoteVenue;
pub use strategy::{resolve, ExecutionStrategy, SERVER_ONLY_TARGETS};

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::telemetry::{RunEvent, RunOutcome, TelemetryHandle};

/// A finished conversion and how it got there.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub result: ConversionResult,
    /// Strategy of the successful attempt.
    pub strategy: ExecutionStrategy,
    pub attempts: u32,
}

pub struct ConversionEngine {
    capabilities: CapabilitySnapshot,
    codecs: CodecRegistry,
    channel: IsolatedChannel,
    /// Jobs queue for the isolated channel instead of seeing `Busy`.
    channel_turn: Mutex<()>,
    remote: RemoteVenue,
    telemetry: Option<TelemetryHandle>,
}

impl ConversionEngine {
    /// Builds an engine from the process-wide capability snapshot.
    pub async fn new(config: &EngineConfig) -> Result<Self, ConversionError> {
        let capabilities = capabilities::snapshot(config).await.clone();
        let codecs = CodecRegistry::standard(config, &capabilities)?;
        Self::with_parts(config, capabilities, codecs)
    }

    /// Builds an engine with explicit capabilities and codecs.
    pub fn with_parts(
        config: &EngineConfig,
        capabilities: CapabilitySnapshot,
        codecs: CodecRegistry,
    ) -> Result<Self, ConversionError> {
        let channel = IsolatedChannel::new(
            codecs.clone(),
            Duration::from_secs(config.worker_timeout_secs),
        );
        let remote = RemoteVenue::new(config.remote_url.clone(), config.remote_timeout_secs)?;

        Ok(Self {
            capabilities,
            codecs,
            channel,
            channel_turn: Mutex::new(()),
            remote,
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, handle: TelemetryHandle) -> Self {
        self.telemetry = Some(handle);
        self
    }

    pub fn capabilities(&self) -> &CapabilitySnapshot {
        &self.capabilities
    }

    pub fn resolve(&self, job: &ConversionJob) -> Result<ExecutionStrategy, ConversionError> {
        resolve(job.source_format(), job.target_format(), &self.capabilities)
    }

    pub async fn convert(&self, job: ConversionJob) -> Result<ConversionOutcome, ConversionError> {
        self.convert_with_progress(job, None).await
    }

    /// Runs `job` through its fallback chain.
    ///
    /// Progress events are non-decreasing within an attempt; each new
    /// attempt restarts at 0 under its own strategy.
    pub async fn convert_with_progress(
        &self,
        job: ConversionJob,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Result<ConversionOutcome, ConversionError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let mut strategy = self.resolve(&job)?;

        self.emit(RunEvent::Begin {
            run_id,
            operation: job.operation_kind(),
            from: job.source_format(),
            to: job.target_format(),
            strategy,
        });

        let mut fallback = FallbackController::new(job.operation_kind(), strategy);
        let mut current = job;

        let outcome = loop {
            tracing::debug!(
                job_id = %current.job_id(),
                attempt = current.attempt(),
                %strategy,
                "Starting conversion attempt"
            );

            let reporter = ProgressReporter::new(strategy, current.attempt(), progress_tx.clone());
            reporter.start();

            match self.attempt(strategy, &current, &reporter).await {
                Ok(result) => {
                    reporter.finish();
                    fallback.succeed();
                    break Ok(ConversionOutcome {
                        result,
                        strategy,
                        attempts: current.attempt(),
                    });
                }
                Err(error) => match fallback.fail(&error) {
                    Some(next) => {
                        tracing::info!(
                            job_id = %current.job_id(),
                            from = %strategy,
                            to = %next,
                            error = %error,
                            "Falling back to another strategy"
                        );
                        current = current.retry();
                        strategy = next;
                    }
                    None => {
                        tracing::warn!(
                            job_id = %current.job_id(),
                            %strategy,
                            error = %error,
                            "Conversion failed"
                        );
                        break Err(error);
                    }
                },
            }
        };

        self.emit(RunEvent::Finish {
            run_id,
            outcome: if outcome.is_ok() {
                RunOutcome::Succeeded
            } else {
                RunOutcome::Failed
            },
            duration_ms: started.elapsed().as_millis() as u64,
            attempts: current.attempt(),
            strategy,
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });

        outcome
    }

    async fn attempt(
        &self,
        strategy: ExecutionStrategy,
        job: &ConversionJob,
        reporter: &ProgressReporter,
    ) -> Result<ConversionResult, ConversionError> {
        let progress = |percent: f32, message: Option<&str>| reporter.report(percent, message);

        match strategy {
            ExecutionStrategy::LocalIsolated => {
                let _turn = self.channel_turn.lock().await;
                self.channel
                    .execute(CodecRequest::from(job), &progress)
                    .await
            }
            ExecutionStrategy::LocalDegraded => {
                let codec = self.codecs.get(job.operation_kind())?;
                codec.convert(CodecRequest::from(job), &progress).await
            }
            ExecutionStrategy::Remote => self.remote.execute(job, &progress).await,
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.try_emit(event);
        }
    }
}
