//! The page-aware extractor binary: provisioning and invocation.

use futures::StreamExt;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::FetchError;
use super::FetchMode;
use crate::sandbox::SandboxDirectory;
use crate::single_flight::SingleFlight;
use crate::transcoder::process::{run_binary, Invocation};

/// Output template stem; the extractor picks the extension.
const OUTPUT_STEM: &str = "media";

/// Locates the extractor, downloading it once into the cache path when it is
/// not installed.
pub struct ExtractorProvisioner {
    installed: Option<PathBuf>,
    download_url: Option<String>,
    cache_path: PathBuf,
    client: reqwest::Client,
    flight: SingleFlight<PathBuf, PathBuf>,
}

impl ExtractorProvisioner {
    pub fn new(
        installed: Option<PathBuf>,
        download_url: Option<String>,
        cache_path: PathBuf,
        client: reqwest::Client,
    ) -> Self {
        Self {
            installed,
            download_url,
            cache_path,
            client,
            flight: SingleFlight::new(),
        }
    }

    /// Path of a runnable extractor.
    ///
    /// Concurrent first callers share a single download; a failed download is
    /// retried by the next caller.
    pub async fn ensure(&self) -> Result<PathBuf, FetchError> {
        if let Some(path) = &self.installed {
            return Ok(path.clone());
        }
        if let Some(path) = self.flight.get(&self.cache_path) {
            return Ok(path);
        }
        if tokio::fs::metadata(&self.cache_path).await.is_ok() {
            return Ok(self.cache_path.clone());
        }

        let url = self.download_url.clone().ok_or_else(|| {
            FetchError::ExtractionFailed(
                "extractor is not installed and no download URL is configured".to_string(),
            )
        })?;

        self.flight
            .get_or_try_init(self.cache_path.clone(), || self.download(url))
            .await
    }

    async fn download(&self, url: String) -> Result<PathBuf, FetchError> {
        let target = self.cache_path.clone();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::info!(path = %target.display(), "Downloading extractor binary");

        // Written under a temporary name and renamed, so a concurrent
        // metadata check never sees a partial file.
        let partial = target.with_file_name(format!(
            "{}.download-{}",
            target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            Uuid::new_v4().simple()
        ));

        if let Err(e) = self.install(&url, &partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tracing::info!(path = %target.display(), "Extractor binary installed");
        Ok(target)
    }

    async fn install(&self, url: &str, partial: &Path, target: &Path) -> Result<(), FetchError> {
        self.write_download(url, partial).await?;
        make_executable(partial).await?;
        tokio::fs::rename(partial, target).await?;
        Ok(())
    }

    async fn write_download(&self, url: &str, partial: &Path) -> Result<(), FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(partial).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(FetchError::Download("extractor download was empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), FetchError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), FetchError> {
    Ok(())
}

fn extractor_args(url: &Url, mode: FetchMode) -> Vec<String> {
    let mut args = vec![
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "--no-mtime".to_string(),
        "-o".to_string(),
        format!("{OUTPUT_STEM}.%(ext)s"),
    ];
    match mode {
        FetchMode::Audio => args.extend(
            ["-x", "--audio-format", "mp3"].map(String::from),
        ),
        FetchMode::Video => args.extend(
            ["-f", "bv*+ba/b", "--merge-output-format", "mp4"].map(String::from),
        ),
    }
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Runs the extractor against `url` inside `sandbox` and returns the path of
/// the produced file.
pub async fn run_extractor(
    binary: &Path,
    url: &Url,
    mode: FetchMode,
    sandbox: &SandboxDirectory,
    timeout_secs: u64,
) -> Result<PathBuf, FetchError> {
    let invocation = Invocation::new(binary, extractor_args(url, mode), timeout_secs);
    run_binary(invocation, sandbox, |line| {
        tracing::trace!(line, "extractor");
    })
    .await
    .map_err(|e| FetchError::ExtractionFailed(e.to_string()))?;

    find_output(sandbox.path())
        .await?
        .ok_or_else(|| FetchError::ExtractionFailed("extractor produced no output".to_string()))
}

/// The non-empty, finished output file, preferring the template stem.
async fn find_output(dir: &Path) -> Result<Option<PathBuf>, FetchError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut fallback = None;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !metadata.is_file()
            || metadata.len() == 0
            || name.ends_with(".part")
            || name.ends_with(".ytdl")
        {
            continue;
        }
        if name.starts_with(&format!("{OUTPUT_STEM}.")) {
            return Ok(Some(entry.path()));
        }
        fallback.get_or_insert(entry.path());
    }

    Ok(fallback)
}
