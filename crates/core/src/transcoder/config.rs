//! Configuration for the server transcoding services.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration shared by the raster and media transcoders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to the ImageMagick `magick` binary.
    #[serde(default = "default_magick_path")]
    pub magick_path: PathBuf,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to exiftool, used to pull embedded previews out of camera raw files.
    #[serde(default = "default_exiftool_path")]
    pub exiftool_path: PathBuf,

    /// Parent directory for per-request sandboxes.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,

    /// Timeout for a single binary invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent conversions per family.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Retry camera raw conversions on the embedded preview when the primary path fails.
    #[serde(default = "default_preview_extraction")]
    pub preview_extraction: bool,
}

fn default_magick_path() -> PathBuf {
    PathBuf::from("magick")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_exiftool_path() -> PathBuf {
    PathBuf::from("exiftool")
}

fn default_sandbox_root() -> PathBuf {
    std::env::temp_dir().join("mediaforge")
}

fn default_timeout() -> u64 {
    300
}

fn default_max_parallel() -> usize {
    4
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_preview_extraction() -> bool {
    true
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            magick_path: default_magick_path(),
            ffmpeg_path: default_ffmpeg_path(),
            exiftool_path: default_exiftool_path(),
            sandbox_root: default_sandbox_root(),
            timeout_secs: default_timeout(),
            max_parallel: default_max_parallel(),
            ffmpeg_log_level: default_log_level(),
            preview_extraction: default_preview_extraction(),
        }
    }
}

impl TranscoderConfig {
    /// Sets the binary paths.
    pub fn with_binaries(mut self, magick: PathBuf, ffmpeg: PathBuf, exiftool: PathBuf) -> Self {
        self.magick_path = magick;
        self.ffmpeg_path = ffmpeg;
        self.exiftool_path = exiftool;
        self
    }

    /// Sets the sandbox root directory.
    pub fn with_sandbox_root(mut self, root: PathBuf) -> Self {
        self.sandbox_root = root;
        self
    }

    /// Sets the maximum parallel conversions.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
