//! Conversion jobs and their results.

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use super::error::ConversionError;
use crate::format::{MediaFormat, OperationKind};

/// An immutable description of one conversion attempt.
///
/// The payload is reference counted; [`ConversionJob::retry`] produces the
/// next attempt sharing the same bytes.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    job_id: Uuid,
    attempt: u32,
    from: MediaFormat,
    to: MediaFormat,
    kind: OperationKind,
    payload: Bytes,
    quality: Option<f32>,
}

impl ConversionJob {
    /// Creates the first attempt for a declared format pair.
    pub fn new(
        from: MediaFormat,
        to: MediaFormat,
        payload: impl Into<Bytes>,
        quality: Option<f32>,
    ) -> Result<Self, ConversionError> {
        let kind =
            OperationKind::for_pair(from, to).ok_or_else(|| ConversionError::UnsupportedFormat {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        Ok(Self {
            job_id: Uuid::new_v4(),
            attempt: 1,
            from,
            to,
            kind,
            payload: payload.into(),
            quality: quality.map(|q| q.clamp(0.0, 1.0)),
        })
    }

    /// The next attempt of the same job.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            payload: self.payload.clone(),
            ..*self
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn source_format(&self) -> MediaFormat {
        self.from
    }

    pub fn target_format(&self) -> MediaFormat {
        self.to
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn quality_hint(&self) -> Option<f32> {
        self.quality
    }
}

/// Output of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversionResult {
    Single { buffer: Vec<u8> },
    /// One buffer per page, in page order.
    Multiple { buffers: Vec<Vec<u8>> },
}

impl ConversionResult {
    pub fn buffers(&self) -> Vec<&[u8]> {
        match self {
            Self::Single { buffer } => vec![buffer.as_slice()],
            Self::Multiple { buffers } => buffers.iter().map(Vec::as_slice).collect(),
        }
    }

    pub fn into_buffers(self) -> Vec<Vec<u8>> {
        match self {
            Self::Single { buffer } => vec![buffer],
            Self::Multiple { buffers } => buffers,
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.buffers().iter().map(|b| b.len()).sum()
    }
}
