//! Configuration for the client-side conversion engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of a mediaforge server used by the remote strategy.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// Seconds a local attempt may run before its execution context is discarded.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,

    /// Timeout for one remote conversion request.
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    /// ffmpeg used for local time-based media.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// pdftoppm used for local PDF rasterization.
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: PathBuf,

    /// Parent directory for local sandboxes.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,

    /// Report isolated execution as unavailable without probing.
    #[serde(default)]
    pub disable_isolation: bool,
}

fn default_remote_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_worker_timeout() -> u64 {
    120
}

fn default_remote_timeout() -> u64 {
    600
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_pdftoppm_path() -> PathBuf {
    PathBuf::from("pdftoppm")
}

fn default_sandbox_root() -> PathBuf {
    std::env::temp_dir().join("mediaforge-local")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            worker_timeout_secs: default_worker_timeout(),
            remote_timeout_secs: default_remote_timeout(),
            ffmpeg_path: default_ffmpeg_path(),
            pdftoppm_path: default_pdftoppm_path(),
            sandbox_root: default_sandbox_root(),
            disable_isolation: false,
        }
    }
}

impl EngineConfig {
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    pub fn with_worker_timeout(mut self, secs: u64) -> Self {
        self.worker_timeout_secs = secs;
        self
    }

    pub fn with_sandbox_root(mut self, root: PathBuf) -> Self {
        self.sandbox_root = root;
        self
    }
}
