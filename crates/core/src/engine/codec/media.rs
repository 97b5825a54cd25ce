//! Local audio/video conversion with the probed ffmpeg.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

use super::{CodecRequest, LocalCodec};
use crate::engine::error::ConversionError;
use crate::engine::job::ConversionResult;
use crate::engine::progress::ProgressFn;
use crate::sandbox::SandboxDirectory;
use crate::transcoder::process::{read_output, run_binary, Invocation};
use crate::transcoder::{RecipeTable, TranscodeError, TranscodeFamily};

/// Tracks ffmpeg's `-progress` output against the input duration.
struct FfmpegProgress {
    duration_re: Option<Regex>,
    time_re: Option<Regex>,
    duration_secs: Option<f64>,
}

impl FfmpegProgress {
    fn new() -> Self {
        Self {
            duration_re: Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").ok(),
            time_re: Regex::new(r"out_time_ms=(\d+)").ok(),
            duration_secs: None,
        }
    }

    /// Returns a percentage when `line` moves the conversion forward.
    fn parse_line(&mut self, line: &str) -> Option<f32> {
        if self.duration_secs.is_none() {
            if let Some(caps) = self.duration_re.as_ref().and_then(|re| re.captures(line)) {
                let h: f64 = caps.get(1)?.as_str().parse().ok()?;
                let m: f64 = caps.get(2)?.as_str().parse().ok()?;
                let s: f64 = caps.get(3)?.as_str().parse().ok()?;
                self.duration_secs = Some(h * 3600.0 + m * 60.0 + s);
                return None;
            }
        }

        let caps = self.time_re.as_ref()?.captures(line)?;
        // out_time_ms is in microseconds.
        let current = caps.get(1)?.as_str().parse::<f64>().ok()? / 1_000_000.0;
        let duration = self.duration_secs.filter(|d| *d > 0.0)?;
        Some(((current / duration) * 100.0).min(99.0) as f32)
    }
}

pub struct LocalMediaCodec {
    ffmpeg: Option<PathBuf>,
    recipes: RecipeTable,
    sandbox_root: PathBuf,
    timeout_secs: u64,
}

impl LocalMediaCodec {
    /// `ffmpeg` is `None` when no local toolchain was found. Fails when the
    /// media recipe table has a gap.
    pub fn new(
        ffmpeg: Option<PathBuf>,
        sandbox_root: PathBuf,
        timeout_secs: u64,
    ) -> Result<Self, TranscodeError> {
        let recipes = RecipeTable::validated(TranscodeFamily::Media)?;
        Ok(Self {
            ffmpeg,
            recipes,
            sandbox_root,
            timeout_secs,
        })
    }

    async fn run(
        &self,
        ffmpeg: &Path,
        recipes: &RecipeTable,
        sandbox: &SandboxDirectory,
        request: &CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<Vec<u8>, ConversionError> {
        let input = sandbox.file(&format!("input.{}", request.from.extension()));
        let output = sandbox.file(&format!("output.{}", request.to.extension()));
        tokio::fs::write(&input, &request.payload).await?;

        let args = recipes.ffmpeg_args(
            request.from,
            request.to,
            &input,
            &output,
            request.quality,
            "info",
            true,
        )?;

        let mut tracker = FfmpegProgress::new();
        run_binary(
            Invocation::new(ffmpeg, args, self.timeout_secs),
            sandbox,
            |line| {
                if let Some(percent) = tracker.parse_line(line) {
                    progress(percent, None);
                }
            },
        )
        .await?;

        Ok(read_output(&output).await?)
    }
}

#[async_trait]
impl LocalCodec for LocalMediaCodec {
    fn name(&self) -> &str {
        "media"
    }

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        let ffmpeg = self
            .ffmpeg
            .as_deref()
            .ok_or_else(|| ConversionError::decode_unsupported("local media toolchain not found"))?;

        let sandbox = SandboxDirectory::create(&self.sandbox_root).await?;
        let result = self
            .run(ffmpeg, &self.recipes, &sandbox, &request, progress)
            .await;
        sandbox.close().await;

        result.map(|buffer| ConversionResult::Single { buffer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{MediaFormat, OperationKind};
    use bytes::Bytes;
    use tempfile::TempDir;

    fn no_progress(_: f32, _: Option<&str>) {}

    #[test]
    fn test_progress_parsing() {
        let mut tracker = FfmpegProgress::new();
        assert_eq!(tracker.parse_line("out_time_ms=1000000"), None);
        assert_eq!(
            tracker.parse_line("  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s"),
            None
        );
        assert_eq!(tracker.parse_line("out_time_ms=5000000"), Some(50.0));
        assert_eq!(tracker.parse_line("out_time_ms=60000000"), Some(99.0));
        assert_eq!(tracker.parse_line("progress=continue"), None);
    }

    #[test]
    fn test_new_loads_complete_recipe_table() {
        let codec = LocalMediaCodec::new(None, PathBuf::from("/tmp"), 10).unwrap();
        assert_eq!(codec.recipes.family(), TranscodeFamily::Media);
    }

    #[tokio::test]
    async fn test_without_toolchain() {
        let root = TempDir::new().unwrap();
        let codec = LocalMediaCodec::new(None, root.path().to_path_buf(), 10).unwrap();
        let request = CodecRequest {
            kind: OperationKind::TimeBasedMedia,
            from: MediaFormat::Wav,
            to: MediaFormat::Mp3,
            payload: Bytes::from_static(b"RIFF"),
            quality: None,
        };
        let err = codec.convert(request, &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::DecodeUnsupported { .. }));
    }
}
