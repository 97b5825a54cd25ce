//! FFmpeg-backed audio/video transcoding.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::process::{read_output, run_binary, Invocation};
use super::recipe::{RecipeTable, TranscodeFamily};
use super::traits::{TranscodeOutput, TranscodeRequest, Transcoder};
use crate::sandbox::SandboxDirectory;

pub struct MediaTranscoder {
    config: TranscoderConfig,
    recipes: RecipeTable,
    permits: Arc<Semaphore>,
}

impl MediaTranscoder {
    pub fn new(config: TranscoderConfig) -> Result<Self, TranscodeError> {
        let recipes = RecipeTable::validated(TranscodeFamily::Media)?;
        let permits = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Ok(Self {
            config,
            recipes,
            permits,
        })
    }

    async fn transcode_in(
        &self,
        sandbox: &SandboxDirectory,
        request: &TranscodeRequest,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let input = sandbox.file(&format!("input.{}", request.from.extension()));
        let output = sandbox.file(&format!("output.{}", request.to.extension()));
        tokio::fs::write(&input, &request.input).await?;

        let args = self.recipes.ffmpeg_args(
            request.from,
            request.to,
            &input,
            &output,
            request.quality,
            &self.config.ffmpeg_log_level,
            false,
        )?;

        run_binary(
            Invocation::new(&self.config.ffmpeg_path, args, self.config.timeout_secs),
            sandbox,
            |_| {},
        )
        .await?;

        Ok(TranscodeOutput {
            bytes: read_output(&output).await?,
            format: request.to,
            used_preview: false,
        })
    }
}

#[async_trait]
impl Transcoder for MediaTranscoder {
    fn family(&self) -> TranscodeFamily {
        TranscodeFamily::Media
    }

    async fn transcode(&self, request: TranscodeRequest) -> Result<TranscodeOutput, TranscodeError> {
        if request.input.is_empty() {
            return Err(TranscodeError::EmptyInput);
        }
        TranscodeFamily::Media
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
