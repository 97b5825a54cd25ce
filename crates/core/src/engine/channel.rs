//! Isolated execution channel.
//!
//! Local conversions run on a dedicated worker thread with its own
//! single-threaded runtime. The caller talks to it only through messages:
//! one submission in, zero or more [`WorkerMessage::Progress`] out, then
//! exactly one terminal [`WorkerMessage::Completed`] or
//! [`WorkerMessage::Failed`].
//!
//! A panic inside a codec ends the worker thread; the pending job observes
//! [`ConversionError::ChannelFault`]. A job that outlives the timeout gets
//! the same error and its worker is abandoned. The next submission starts a
//! fresh worker.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use super::codec::{CodecRegistry, CodecRequest};
use super::error::ConversionError;
use super::job::ConversionResult;
use super::progress::ProgressFn;

/// Submission to the worker. The payload is moved, not copied.
pub type WorkerRequest = CodecRequest;

/// Messages from the worker back to the submitting caller.
#[derive(Debug)]
pub enum WorkerMessage {
    Progress {
        progress: f32,
        message: Option<String>,
    },
    Completed(ConversionResult),
    Failed(ConversionError),
}

struct Envelope {
    request: WorkerRequest,
    reply: mpsc::UnboundedSender<WorkerMessage>,
}

struct Worker {
    tx: mpsc::UnboundedSender<Envelope>,
    handle: JoinHandle<()>,
}

pub struct IsolatedChannel {
    codecs: CodecRegistry,
    timeout: Duration,
    worker: Mutex<Option<Worker>>,
    in_flight: AtomicBool,
    generations: AtomicU64,
}

/// Marks the channel busy for one job. Dropping it before the terminal
/// message (a cancelled caller) discards the worker.
struct InFlight<'a> {
    channel: &'a IsolatedChannel,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn acquire(channel: &'a IsolatedChannel) -> Result<Self, ConversionError> {
        channel
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConversionError::Busy)?;
        Ok(Self {
            channel,
            settled: false,
        })
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.channel.discard_worker();
        }
        self.channel.in_flight.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn spawn_worker(codecs: CodecRegistry, generation: u64) -> std::io::Result<Worker> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    let handle = std::thread::Builder::new()
        .name(format!("mediaforge-worker-{generation}"))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!(generation, error = %e, "Worker runtime failed to start");
                    return;
                }
            };

            while let Some(Envelope { request, reply }) = rx.blocking_recv() {
                let kind = request.kind;
                let progress_reply = reply.clone();
                let progress = move |progress: f32, message: Option<&str>| {
                    let _ = progress_reply.send(WorkerMessage::Progress {
                        progress,
                        message: message.map(str::to_string),
                    });
                };

                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    runtime.block_on(async {
                        let codec = codecs.get(kind)?;
                        codec.convert(request, &progress).await
                    })
                }));

                match outcome {
                    Ok(Ok(result)) => {
                        let _ = reply.send(WorkerMessage::Completed(result));
                    }
                    Ok(Err(error)) => {
                        let _ = reply.send(WorkerMessage::Failed(error));
                    }
                    Err(panic) => {
                        tracing::error!(
                            generation,
                            panic = %panic_message(panic.as_ref()),
                            "Worker crashed"
                        );
                        return;
                    }
                }
            }
        })?;

    Ok(Worker { tx, handle })
}

impl IsolatedChannel {
    pub fn new(codecs: CodecRegistry, timeout: Duration) -> Self {
        Self {
            codecs,
            timeout,
            worker: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            generations: AtomicU64::new(0),
        }
    }

    /// Number of worker contexts started so far.
    pub fn workers_started(&self) -> u64 {
        self.generations.load(Ordering::Acquire)
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Envelope>, ConversionError> {
        let mut slot = self.worker.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                return Ok(worker.tx.clone());
            }
        }

        let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
        let worker = spawn_worker(self.codecs.clone(), generation).map_err(|e| {
            ConversionError::channel_fault(format!("failed to start worker: {e}"))
        })?;
        tracing::debug!(generation, "Started isolated worker");

        let tx = worker.tx.clone();
        *slot = Some(worker);
        Ok(tx)
    }

    fn discard_worker(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if slot.take().is_some() {
            tracing::debug!("Discarded isolated worker");
        }
    }

    /// Runs one job on the worker, forwarding its progress to `on_progress`.
    ///
    /// Refuses with [`ConversionError::Busy`] while another job is in flight.
    pub async fn execute(
        &self,
        request: WorkerRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        let mut in_flight = InFlight::acquire(self)?;

        let tx = self.sender()?;
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        if tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            in_flight.settle();
            self.discard_worker();
            return Err(ConversionError::channel_fault("worker is not accepting jobs"));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            match tokio::time::timeout_at(deadline, reply_rx.recv()).await {
                Ok(Some(WorkerMessage::Progress { progress, message })) => {
                    on_progress(progress, message.as_deref());
                }
                Ok(Some(WorkerMessage::Completed(result))) => {
                    in_flight.settle();
                    return Ok(result);
                }
                Ok(Some(WorkerMessage::Failed(error))) => {
                    in_flight.settle();
                    return Err(error);
                }
                Ok(None) => {
                    in_flight.settle();
                    self.discard_worker();
                    return Err(ConversionError::channel_fault(
                        "worker terminated without a result",
                    ));
                }
                Err(_) => {
                    in_flight.settle();
                    self.discard_worker();
                    return Err(ConversionError::channel_fault(format!(
                        "no result after {} seconds",
                        self.timeout.as_secs()
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{MediaFormat, OperationKind};
    use crate::testing::{MockBehavior, MockCodec};
    use bytes::Bytes;
    use std::sync::Arc;

    fn request() -> WorkerRequest {
        CodecRequest {
            kind: OperationKind::RasterImage,
            from: MediaFormat::Png,
            to: MediaFormat::Webp,
            payload: Bytes::from_static(b"payload"),
            quality: None,
        }
    }

    fn channel(codec: Arc<MockCodec>, timeout_ms: u64) -> IsolatedChannel {
        IsolatedChannel::new(
            CodecRegistry::empty().with(OperationKind::RasterImage, codec),
            Duration::from_millis(timeout_ms),
        )
    }

    fn no_progress(_: f32, _: Option<&str>) {}

    #[tokio::test]
    async fn test_completed_job_reuses_worker() {
        let codec = Arc::new(MockCodec::new(vec![
            MockBehavior::Succeed(b"one".to_vec()),
            MockBehavior::Succeed(b"two".to_vec()),
        ]));
        let channel = channel(codec.clone(), 5_000);

        let first = channel.execute(request(), &no_progress).await.unwrap();
        let second = channel.execute(request(), &no_progress).await.unwrap();

        assert_eq!(first, ConversionResult::Single { buffer: b"one".to_vec() });
        assert_eq!(second, ConversionResult::Single { buffer: b"two".to_vec() });
        assert_eq!(channel.workers_started(), 1);
        assert_eq!(codec.calls(), 2);
    }

    #[tokio::test]
    async fn test_progress_arrives_before_terminal() {
        let codec = Arc::new(MockCodec::new(vec![MockBehavior::Succeed(b"ok".to_vec())]));
        let channel = channel(codec, 5_000);
        let seen = Mutex::new(Vec::new());
        let record = |p: f32, _: Option<&str>| seen.lock().unwrap().push(p);

        channel.execute(request(), &record).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![50.0]);
    }

    #[tokio::test]
    async fn test_codec_error_is_forwarded() {
        let codec = Arc::new(MockCodec::new(vec![MockBehavior::DecodeUnsupported]));
        let channel = channel(codec, 5_000);

        let err = channel.execute(request(), &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::DecodeUnsupported { .. }));
        assert_eq!(channel.workers_started(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_channel_fault_and_worker_is_recreated() {
        let codec = Arc::new(MockCodec::new(vec![
            MockBehavior::Panic,
            MockBehavior::Succeed(b"after".to_vec()),
        ]));
        let channel = channel(codec, 5_000);

        let err = channel.execute(request(), &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::ChannelFault { .. }));

        let result = channel.execute(request(), &no_progress).await.unwrap();
        assert_eq!(result, ConversionResult::Single { buffer: b"after".to_vec() });
        assert_eq!(channel.workers_started(), 2);
    }

    #[tokio::test]
    async fn test_timeout_becomes_channel_fault() {
        let codec = Arc::new(MockCodec::new(vec![
            MockBehavior::Hang,
            MockBehavior::Succeed(b"fresh".to_vec()),
        ]));
        let channel = channel(codec, 200);

        let err = channel.execute(request(), &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::ChannelFault { .. }));

        let result = channel.execute(request(), &no_progress).await.unwrap();
        assert_eq!(result, ConversionResult::Single { buffer: b"fresh".to_vec() });
        assert_eq!(channel.workers_started(), 2);
    }

    #[tokio::test]
    async fn test_second_submission_while_busy_is_refused() {
        let codec = Arc::new(MockCodec::new(vec![MockBehavior::Hang]));
        let channel = Arc::new(channel(codec, 1_000));

        let background = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.execute(request(), &no_progress).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = channel.execute(request(), &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::Busy));

        let first = background.await.unwrap();
        assert!(matches!(first, Err(ConversionError::ChannelFault { .. })));
    }
}
