//! Trait definitions for the transcoding services.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::TranscodeError;
use super::recipe::TranscodeFamily;
use crate::format::MediaFormat;

/// One upload to convert.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub from: MediaFormat,
    pub to: MediaFormat,
    pub input: Bytes,
    /// 0.0–1.0, mapped onto the recipe's quality control.
    pub quality: Option<f32>,
}

/// Converted bytes.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub bytes: Vec<u8>,
    pub format: MediaFormat,
    /// The output was produced from an embedded camera preview.
    pub used_preview: bool,
}

/// A server-side converter that shells out to an external binary.
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn family(&self) -> TranscodeFamily;

    /// Converts `request.input`. Every call gets its own sandbox directory,
    /// removed before this returns.
    async fn transcode(&self, request: TranscodeRequest) -> Result<TranscodeOutput, TranscodeError>;
}
