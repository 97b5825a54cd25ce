use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the remote media acquisition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Extractor binary to use when it is already installed.
    /// When unset, the cached download at `extractor_cache_path` is used.
    #[serde(default)]
    pub extractor_path: Option<PathBuf>,

    /// Distribution URL the extractor is downloaded from on first use.
    #[serde(default)]
    pub extractor_download_url: Option<String>,

    #[serde(default = "default_extractor_cache_path")]
    pub extractor_cache_path: PathBuf,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single direct HTTP request, including the body stream.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_extractor_timeout_secs")]
    pub extractor_timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Disables the private-network guard. Only meant for local testing.
    #[serde(default)]
    pub allow_private_networks: bool,

    /// Directory under which per-request extractor sandboxes are created.
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: PathBuf,
}

fn default_extractor_cache_path() -> PathBuf {
    std::env::temp_dir().join("mediaforge-bin").join("yt-dlp")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_extractor_timeout_secs() -> u64 {
    600
}

fn default_max_redirects() -> usize {
    5
}

fn default_sandbox_root() -> PathBuf {
    std::env::temp_dir().join("mediaforge-fetch")
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            extractor_path: None,
            extractor_download_url: None,
            extractor_cache_path: default_extractor_cache_path(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            extractor_timeout_secs: default_extractor_timeout_secs(),
            max_redirects: default_max_redirects(),
            allow_private_networks: false,
            sandbox_root: default_sandbox_root(),
        }
    }
}

impl FetcherConfig {
    pub fn with_extractor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extractor_path = Some(path.into());
        self
    }

    pub fn with_extractor_download(
        mut self,
        url: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        self.extractor_download_url = Some(url.into());
        self.extractor_cache_path = cache_path.into();
        self
    }

    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = root.into();
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_private_networks(mut self, allow: bool) -> Self {
        self.allow_private_networks = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_block_private_networks() {
        let config = FetcherConfig::default();
        assert!(!config.allow_private_networks);
        assert_eq!(config.max_redirects, 5);
        assert!(config.extractor_path.is_none());
        assert!(config.extractor_cache_path.ends_with("yt-dlp"));
    }

    #[test]
    fn test_builders() {
        let config = FetcherConfig::default()
            .with_extractor_download("https://example.com/yt-dlp", "/tmp/bin/yt-dlp")
            .with_max_redirects(1)
            .with_private_networks(true);

        assert_eq!(config.extractor_download_url.as_deref(), Some("https://example.com/yt-dlp"));
        assert_eq!(config.extractor_cache_path, PathBuf::from("/tmp/bin/yt-dlp"));
        assert_eq!(config.max_redirects, 1);
        assert!(config.allow_private_networks);
    }
}
