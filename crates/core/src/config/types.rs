use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::engine::EngineConfig;
use crate::fetcher::FetcherConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted upload for the convert endpoints.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    512 * 1024 * 1024
}

/// Sanitized config for API responses.
///
/// Filesystem paths and download locations are reduced to booleans so the
/// server never discloses its layout to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub transcoder: SanitizedTranscoderConfig,
    pub fetcher: SanitizedFetcherConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranscoderConfig {
    pub timeout_secs: u64,
    pub max_parallel: usize,
    pub preview_extraction_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedFetcherConfig {
    pub max_redirects: usize,
    pub request_timeout_secs: u64,
    pub extractor_download_configured: bool,
    pub allow_private_networks: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            transcoder: SanitizedTranscoderConfig {
                timeout_secs: config.transcoder.timeout_secs,
                max_parallel: config.transcoder.max_parallel,
                preview_extraction_enabled: config.transcoder.preview_extraction,
            },
            fetcher: SanitizedFetcherConfig {
                max_redirects: config.fetcher.max_redirects,
                request_timeout_secs: config.fetcher.request_timeout_secs,
                extractor_download_configured: config.fetcher.extractor_download_url.is_some(),
                allow_private_networks: config.fetcher.allow_private_networks,
            },
        }
    }
}
