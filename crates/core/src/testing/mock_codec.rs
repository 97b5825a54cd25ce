//! Mock local codec for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::engine::{CodecRequest, ConversionError, ConversionResult, LocalCodec, ProgressFn};

/// What the next `convert` call does.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reports 50% progress, then returns the buffer.
    Succeed(Vec<u8>),
    SucceedMultiple(Vec<Vec<u8>>),
    DecodeUnsupported,
    EncodeFailed,
    ChannelFault,
    Panic,
    /// Sleeps far past any test timeout.
    Hang,
}

/// Mock implementation of the LocalCodec trait.
///
/// Behaviors are consumed one per call; once the queue is exhausted the last
/// behavior repeats. Every payload is recorded so tests can check that a
/// retry carried the same bytes.
#[derive(Debug)]
pub struct MockCodec {
    behaviors: Mutex<VecDeque<MockBehavior>>,
    last: Mutex<Option<MockBehavior>>,
    payloads: Mutex<Vec<Bytes>>,
}

impl MockCodec {
    pub fn new(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            last: Mutex::new(None),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// A codec that always succeeds with `buffer`.
    pub fn succeeding(buffer: &[u8]) -> Self {
        Self::new(vec![MockBehavior::Succeed(buffer.to_vec())])
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    /// Payloads received, in call order.
    pub fn payloads(&self) -> Vec<Bytes> {
        self.payloads.lock().unwrap().clone()
    }

    fn next_behavior(&self) -> MockBehavior {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.behaviors.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone().unwrap_or(MockBehavior::DecodeUnsupported)
    }
}

#[async_trait]
impl LocalCodec for MockCodec {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        self.payloads.lock().unwrap().push(request.payload.clone());

        match self.next_behavior() {
            MockBehavior::Succeed(buffer) => {
                progress(50.0, Some("mock"));
                Ok(ConversionResult::Single { buffer })
            }
            MockBehavior::SucceedMultiple(buffers) => Ok(ConversionResult::Multiple { buffers }),
            MockBehavior::DecodeUnsupported => Err(ConversionError::decode_unsupported(format!(
                "mock cannot decode {}",
                request.from
            ))),
            MockBehavior::EncodeFailed => Err(ConversionError::encode_failed("mock encoder failed")),
            MockBehavior::ChannelFault => Err(ConversionError::channel_fault("mock fault")),
            MockBehavior::Panic => panic!("mock codec panicked"),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ConversionError::channel_fault("mock hang ended"))
            }
        }
    }
}
