//! Local codecs run by the local-isolated and local-degraded venues.

mod document;
mod media;
mod raster;
mod table;
mod tabular;

pub use document::PdfRasterizer;
pub use media::LocalMediaCodec;
pub use raster::RasterCodec;
pub use table::{DelimitedTableCodec, Table, TableCodec, TableError};
pub use tabular::TabularCodec;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

use super::capabilities::CapabilitySnapshot;
use super::config::EngineConfig;
use super::error::ConversionError;
use super::job::{ConversionJob, ConversionResult};
use super::progress::ProgressFn;
use crate::format::{MediaFormat, OperationKind};

/// Input handed to a local codec. The payload is moved in.
#[derive(Debug, Clone)]
pub struct CodecRequest {
    pub kind: OperationKind,
    pub from: MediaFormat,
    pub to: MediaFormat,
    pub payload: Bytes,
    pub quality: Option<f32>,
}

impl From<&ConversionJob> for CodecRequest {
    fn from(job: &ConversionJob) -> Self {
        Self {
            kind: job.operation_kind(),
            from: job.source_format(),
            to: job.target_format(),
            payload: job.payload().clone(),
            quality: job.quality_hint(),
        }
    }
}

/// A converter for one operation kind.
#[async_trait]
pub trait LocalCodec: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError>;
}

/// Codecs by operation kind, shared between the worker and the caller.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<OperationKind, Arc<dyn LocalCodec>>,
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in codecs. Toolchain-backed codecs only run when the probe
    /// found their binary. Fails when a recipe table is incomplete.
    pub fn standard(
        config: &EngineConfig,
        capabilities: &CapabilitySnapshot,
    ) -> Result<Self, ConversionError> {
        let pdftoppm = capabilities
            .local_pdf_rasterizer_available
            .then(|| config.pdftoppm_path.clone());
        let ffmpeg = capabilities
            .local_media_toolchain_available
            .then(|| config.ffmpeg_path.clone());

        let media = LocalMediaCodec::new(
            ffmpeg,
            config.sandbox_root.clone(),
            config.worker_timeout_secs,
        )?;

        Ok(Self::empty()
            .with(OperationKind::RasterImage, Arc::new(RasterCodec))
            .with(
                OperationKind::PaginatedDocument,
                Arc::new(PdfRasterizer::new(
                    pdftoppm,
                    config.sandbox_root.clone(),
                    config.worker_timeout_secs,
                )),
            )
            .with(
                OperationKind::TabularCompress,
                Arc::new(TabularCodec::new(Arc::new(DelimitedTableCodec))),
            )
            .with(OperationKind::TimeBasedMedia, Arc::new(media)))
    }

    pub fn with(mut self, kind: OperationKind, codec: Arc<dyn LocalCodec>) -> Self {
        self.codecs.insert(kind, codec);
        self
    }

    pub fn get(&self, kind: OperationKind) -> Result<Arc<dyn LocalCodec>, ConversionError> {
        self.codecs
            .get(&kind)
            .cloned()
            .ok_or_else(|| ConversionError::decode_unsupported(format!("no local codec for {kind}")))
    }
}
