//! Tabular re-serialization and gzip compression.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;

use super::table::TableCodec;
use super::{CodecRequest, LocalCodec};
use crate::engine::error::ConversionError;
use crate::engine::job::ConversionResult;
use crate::engine::progress::ProgressFn;
use crate::format::MediaFormat;

pub struct TabularCodec {
    tables: Arc<dyn TableCodec>,
}

impl TabularCodec {
    pub fn new(tables: Arc<dyn TableCodec>) -> Self {
        Self { tables }
    }

    fn gzip(payload: &[u8], quality: Option<f32>) -> Result<Vec<u8>, ConversionError> {
        let level = quality
            .map(|q| Compression::new((q * 9.0).round() as u32))
            .unwrap_or_default();
        let mut encoder = GzEncoder::new(Vec::new(), level);
        encoder
            .write_all(payload)
            .map_err(|e| ConversionError::encode_failed(format!("gzip: {e}")))?;
        encoder
            .finish()
            .map_err(|e| ConversionError::encode_failed(format!("gzip: {e}")))
    }
}

#[async_trait]
impl LocalCodec for TabularCodec {
    fn name(&self) -> &str {
        "tabular"
    }

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        if request.to == MediaFormat::Gz {
            let buffer = Self::gzip(&request.payload, request.quality)?;
            progress(90.0, Some("compressed"));
            return Ok(ConversionResult::Single { buffer });
        }

        let text = std::str::from_utf8(&request.payload)
            .map_err(|e| ConversionError::decode_unsupported(format!("input is not UTF-8: {e}")))?;
        let table = self
            .tables
            .parse(text, request.from)
            .map_err(|e| ConversionError::decode_unsupported(e.to_string()))?;
        progress(50.0, Some("parsed"));

        let output = self
            .tables
            .serialize(&table, request.to)
            .map_err(|e| ConversionError::encode_failed(e.to_string()))?;
        progress(90.0, Some("serialized"));

        Ok(ConversionResult::Single {
            buffer: output.into_bytes(),
        })
    }
}
