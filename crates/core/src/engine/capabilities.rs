//! One-time detection of what the local venues can do.

use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::config::EngineConfig;

/// Capabilities of this process, computed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySnapshot {
    /// A separate worker context can be started for local conversions.
    pub isolated_execution_available: bool,
    /// Buffers move into the worker without copying.
    pub byte_sharing_available: bool,
    /// A working ffmpeg was found for local time-based media.
    pub local_media_toolchain_available: bool,
    /// A working pdftoppm was found for local PDF rasterization.
    pub local_pdf_rasterizer_available: bool,
    /// Why media conversion is degraded, when it is.
    pub reason: Option<String>,
}

impl CapabilitySnapshot {
    /// Everything available.
    pub fn full() -> Self {
        Self {
            isolated_execution_available: true,
            byte_sharing_available: true,
            local_media_toolchain_available: true,
            local_pdf_rasterizer_available: true,
            reason: None,
        }
    }
}

static SNAPSHOT: OnceCell<CapabilitySnapshot> = OnceCell::const_new();

/// Returns the process-wide snapshot, probing on first use.
///
/// Later calls return the first result regardless of `config`.
pub async fn snapshot(config: &EngineConfig) -> &'static CapabilitySnapshot {
    SNAPSHOT
        .get_or_init(|| CapabilityProbe::detect(config))
        .await
}

pub struct CapabilityProbe;

impl CapabilityProbe {
    pub async fn detect(config: &EngineConfig) -> CapabilitySnapshot {
        let isolated = if config.disable_isolation {
            false
        } else {
            tokio::task::spawn_blocking(probe_worker_thread)
                .await
                .unwrap_or(false)
        };
        let media = probe_binary(&config.ffmpeg_path, "-version").await;
        let pdf = probe_binary(&config.pdftoppm_path, "-v").await;

        let reason = match (isolated, media) {
            (true, true) => None,
            (false, true) => Some("isolated execution unavailable".to_string()),
            (true, false) => Some("local media toolchain not found".to_string()),
            (false, false) => Some(
                "isolated execution unavailable and local media toolchain not found".to_string(),
            ),
        };

        let snapshot = CapabilitySnapshot {
            isolated_execution_available: isolated,
            byte_sharing_available: true,
            local_media_toolchain_available: media,
            local_pdf_rasterizer_available: pdf,
            reason,
        };

        tracing::info!(
            isolated = snapshot.isolated_execution_available,
            media_toolchain = snapshot.local_media_toolchain_available,
            pdf_rasterizer = snapshot.local_pdf_rasterizer_available,
            "Detected local capabilities"
        );

        snapshot
    }
}

fn probe_worker_thread() -> bool {
    std::thread::Builder::new()
        .name("mediaforge-probe".to_string())
        .spawn(|| ())
        .map(|handle| handle.join().is_ok())
        .unwrap_or(false)
}

async fn probe_binary(path: &Path, version_flag: &str) -> bool {
    Command::new(path)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
