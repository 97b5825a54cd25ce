//! Remote media acquisition.
//!
//! A [`MediaFetcher`] turns a user-supplied URL into a byte stream: either the
//! direct response when it is already audio or video, or the output of the
//! page-aware extractor run inside a sandbox. Every target, including each
//! redirect hop, passes the [`NetworkGuard`] before it is contacted.

mod classify;
mod config;
mod error;
mod extractor;
mod progress;
mod ssrf;
mod stream;

pub use classify::{classify, filename_for};
pub use config::FetcherConfig;
pub use error::FetchError;
pub use extractor::ExtractorProvisioner;
pub use progress::{DownloadProgress, ProgressTracker};
pub use ssrf::{is_blocked_ip, HostResolver, NetworkGuard, SystemResolver};
pub use stream::SandboxFileStream;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::format::MediaFormat;
use crate::sandbox::SandboxDirectory;

/// What to extract when the URL is a page rather than a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Audio,
    #[default]
    Video,
}

/// A fetch request as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSourceDescriptor {
    pub url: String,
    #[serde(default)]
    pub mode: FetchMode,
}

/// How the bytes were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Direct,
    Extracted,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Extracted => "extracted",
        }
    }
}

pub type MediaStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Fetched media, ready to be streamed to the caller.
pub struct FetchedMedia {
    pub filename: String,
    pub format: MediaFormat,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub source: FetchSource,
    pub body: MediaStream,
}

impl fmt::Debug for FetchedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedMedia")
            .field("filename", &self.filename)
            .field("format", &self.format)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

pub struct MediaFetcher {
    config: FetcherConfig,
    client: reqwest::Client,
    guard: NetworkGuard,
    extractor: ExtractorProvisioner,
}

impl MediaFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::with_parts(config, client, Arc::new(SystemResolver))
    }

    /// Builds a fetcher around an existing client and resolver.
    ///
    /// `client` must not follow redirects on its own; hops are followed here
    /// so each one can be validated.
    pub fn with_parts(
        config: FetcherConfig,
        client: reqwest::Client,
        resolver: Arc<dyn HostResolver>,
    ) -> Result<Self, FetchError> {
        let download_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        let extractor = ExtractorProvisioner::new(
            config.extractor_path.clone(),
            config.extractor_download_url.clone(),
            config.extractor_cache_path.clone(),
            download_client,
        );
        let guard = NetworkGuard::new(resolver, config.allow_private_networks);

        Ok(Self {
            config,
            client,
            guard,
            extractor,
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetches `source`, reporting direct download progress on `progress`.
    pub async fn fetch(
        &self,
        source: &RemoteSourceDescriptor,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<FetchedMedia, FetchError> {
        let url = self.guard.check_str(&source.url).await?;
        let host = url.host_str().unwrap_or_default().to_string();

        if let Some(media) = self.fetch_direct(url.clone(), progress).await? {
            tracing::info!(%host, filename = %media.filename, "Direct media hit");
            return Ok(media);
        }

        tracing::info!(%host, mode = ?source.mode, "No direct media, running extractor");
        self.fetch_extracted(&url, source.mode).await
    }

    async fn fetch_direct(
        &self,
        start: Url,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<Option<FetchedMedia>, FetchError> {
        let mut url = start;
        let mut hops = 0;

        let response = loop {
            let response = self.client.get(url.clone()).send().await?;
            if !response.status().is_redirection() {
                break response;
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FetchError::Download("redirect without location".to_string()))?;

            hops += 1;
            if hops > self.config.max_redirects {
                return Err(FetchError::Download(format!(
                    "more than {} redirects",
                    self.config.max_redirects
                )));
            }

            let next = url
                .join(location)
                .map_err(|e| FetchError::InvalidUrl(format!("bad redirect target: {e}")))?;
            self.guard.check(&next).await?;

            tracing::debug!(
                from = url.host_str().unwrap_or_default(),
                to = next.host_str().unwrap_or_default(),
                hop = hops,
                "Following redirect"
            );
            url = next;
        };

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Direct request was not successful");
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let Some(format) = classify(content_type.as_deref(), &url) else {
            tracing::debug!(content_type = ?content_type, "Direct response is not media");
            return Ok(None);
        };

        let content_length = response.content_length();
        let mut tracker = ProgressTracker::new(content_length);
        let body = response.bytes_stream().map(move |chunk| {
            let chunk = chunk.map_err(|e| io::Error::other(e.without_url()))?;
            let snapshot = tracker.advance(chunk.len());
            if let Some(tx) = &progress {
                let _ = tx.try_send(snapshot);
            }
            Ok::<_, io::Error>(chunk)
        });

        Ok(Some(FetchedMedia {
            filename: filename_for(&url, format),
            format,
            content_type: content_type.unwrap_or_else(|| format.mime_type().to_string()),
            content_length,
            source: FetchSource::Direct,
            body: Box::pin(body),
        }))
    }

    async fn fetch_extracted(
        &self,
        url: &Url,
        mode: FetchMode,
    ) -> Result<FetchedMedia, FetchError> {
        let binary = self.extractor.ensure().await?;
        let sandbox = SandboxDirectory::create(&self.config.sandbox_root).await?;

        let produced = match extractor::run_extractor(
            &binary,
            url,
            mode,
            &sandbox,
            self.config.extractor_timeout_secs,
        )
        .await
        {
            Ok(path) => path,
            Err(e) => {
                sandbox.close().await;
                return Err(e);
            }
        };

        let extension = produced
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(format) = MediaFormat::from_extension(&extension).filter(MediaFormat::is_audio_or_video)
        else {
            sandbox.close().await;
            return Err(FetchError::UnsupportedMediaType(format!(
                "extractor produced '.{extension}'"
            )));
        };

        let file = tokio::fs::File::open(&produced).await?;
        let content_length = file.metadata().await?.len();

        Ok(FetchedMedia {
            filename: filename_for(url, format),
            format,
            content_type: format.mime_type().to_string(),
            content_length: Some(content_length),
            source: FetchSource::Extracted,
            body: Box::pin(SandboxFileStream::new(file, sandbox)),
        })
    }
}
