//! ImageMagick-backed raster transcoding with camera raw preview fallback.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::process::{read_output, run_binary, Invocation};
use super::recipe::{RecipeTable, TranscodeFamily};
use super::traits::{TranscodeOutput, TranscodeRequest, Transcoder};
use crate::format::{FormatFamily, MediaFormat};
use crate::sandbox::SandboxDirectory;

/// exiftool tags tried in order when extracting an embedded preview.
const PREVIEW_TAGS: &[&str] = &["PreviewImage", "JpgFromRaw", "ThumbnailImage"];

pub struct RasterTranscoder {
    config: TranscoderConfig,
    recipes: RecipeTable,
    permits: Arc<Semaphore>,
}

impl RasterTranscoder {
    pub fn new(config: TranscoderConfig) -> Result<Self, TranscodeError> {
        let recipes = RecipeTable::validated(TranscodeFamily::Raster)?;
        let permits = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Ok(Self {
            config,
            recipes,
            permits,
        })
    }

    async fn convert_file(
        &self,
        sandbox: &SandboxDirectory,
        from: MediaFormat,
        to: MediaFormat,
        input: &Path,
        quality: Option<f32>,
    ) -> Result<Vec<u8>, TranscodeError> {
        let output = sandbox.file(&format!("output.{}", to.extension()));
        let args = self.recipes.magick_args(from, to, input, &output, quality)?;

        run_binary(
            Invocation::new(&self.config.magick_path, args, self.config.timeout_secs),
            sandbox,
            |_| {},
        )
        .await?;

        read_output(&output).await
    }

    /// Pulls the largest available embedded JPEG out of a raw file.
    async fn extract_preview(
        &self,
        sandbox: &SandboxDirectory,
        input: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let preview = sandbox.file("preview.jpg");
        let mut last_error = TranscodeError::EmptyOutput;

        for tag in PREVIEW_TAGS {
            let args = vec![
                "-b".to_string(),
                format!("-{tag}"),
                input.display().to_string(),
            ];
            let invocation =
                Invocation::new(&self.config.exiftool_path, args, self.config.timeout_secs)
                    .stdout_to(&preview);

            match run_binary(invocation, sandbox, |_| {}).await {
                Ok(()) => match read_output(&preview).await {
                    Ok(_) => {
                        tracing::debug!(tag, "Extracted embedded preview");
                        return Ok(preview);
                    }
                    Err(e) => last_error = e,
                },
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    async fn transcode_in(
        &self,
        sandbox: &SandboxDirectory,
        request: &TranscodeRequest,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let input = sandbox.file(&format!("input.{}", request.from.extension()));
        tokio::fs::write(&input, &request.input).await?;

        let primary = self
            .convert_file(sandbox, request.from, request.to, &input, request.quality)
            .await;

        match primary {
            Ok(bytes) => Ok(TranscodeOutput {
                bytes,
                format: request.to,
                used_preview: false,
            }),
            Err(primary_error)
                if request.from.family() == FormatFamily::RawCamera
                    && self.config.preview_extraction
                    && !primary_error.is_client_error() =>
            {
                tracing::info!(
                    from = %request.from,
                    error = %primary_error,
                    "Raw decode failed, retrying on embedded preview"
                );
                let preview = match self.extract_preview(sandbox, &input).await {
                    Ok(preview) => preview,
                    Err(e) => {
                        tracing::debug!(error = %e, "No embedded preview available");
                        return Err(primary_error);
                    }
                };
                let bytes = self
                    .convert_file(sandbox, MediaFormat::Jpeg, request.to, &preview, request.quality)
                    .await?;
                Ok(TranscodeOutput {
                    bytes,
                    format: request.to,
                    used_preview: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Transcoder for RasterTranscoder {
    fn family(&self) -> TranscodeFamily {
        TranscodeFamily::Raster
    }

    async fn transcode(&self, request: TranscodeRequest) -> Result<TranscodeOutput, TranscodeError> {
        if request.input.is_empty() {
            return Err(TranscodeError::EmptyInput);
        }
        TranscodeFamily::Raster
            .validate_pair(Some(request.from.extension()), Some(request.to.extension()))?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TranscodeError::Unavailable)?;

        let sandbox = SandboxDirectory::create(&self.config.sandbox_root).await?;
        let result = self.transcode_in(&sandbox, &request).await;
        sandbox.close().await;
        result
    }
}
