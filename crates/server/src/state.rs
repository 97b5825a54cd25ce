use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use mediaforge_core::{
    transcoder::TranscodeFamily, Config, MediaFetcher, MediaTranscoder, RasterTranscoder,
    SanitizedConfig, Transcoder,
};

/// Shared application state
pub struct AppState {
    config: Config,
    raster: Arc<dyn Transcoder>,
    media: Arc<dyn Transcoder>,
    fetcher: Arc<MediaFetcher>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        raster: Arc<dyn Transcoder>,
        media: Arc<dyn Transcoder>,
        fetcher: Arc<MediaFetcher>,
    ) -> Self {
        Self {
            config,
            raster,
            media,
            fetcher,
            started_at: Utc::now(),
        }
    }

    /// Builds both transcoders and the fetcher from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let raster = RasterTranscoder::new(config.transcoder.clone())
            .context("Failed to create raster transcoder")?;
        let media = MediaTranscoder::new(config.transcoder.clone())
            .context("Failed to create media transcoder")?;
        let fetcher =
            MediaFetcher::new(config.fetcher.clone()).context("Failed to create media fetcher")?;

        Ok(Self::new(
            config,
            Arc::new(raster),
            Arc::new(media),
            Arc::new(fetcher),
        ))
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transcoder(&self, family: TranscodeFamily) -> &Arc<dyn Transcoder> {
        match family {
            TranscodeFamily::Raster => &self.raster,
            TranscodeFamily::Media => &self.media,
        }
    }

    pub fn fetcher(&self) -> &MediaFetcher {
        &self.fetcher
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
