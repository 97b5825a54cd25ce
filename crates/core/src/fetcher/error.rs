use thiserror::Error;

/// Errors from the remote media acquisition service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Blocked network target: {host} resolves to a private or reserved address")]
    BlockedNetworkTarget { host: String },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn blocked(host: impl Into<String>) -> Self {
        Self::BlockedNetworkTarget { host: host.into() }
    }

    /// Input validation failures. Retrying them cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::BlockedNetworkTarget { .. } | Self::UnsupportedMediaType(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // Drop the URL: it may carry credentials or internal hostnames.
        Self::Download(e.without_url().to_string())
    }
}
