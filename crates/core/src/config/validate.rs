use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Timeouts and parallelism are non-zero
/// - The engine's remote URL is http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.transcoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.transcoder.max_parallel == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.max_parallel cannot be 0".to_string(),
        ));
    }

    if config.fetcher.request_timeout_secs == 0 || config.fetcher.extractor_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher timeouts cannot be 0".to_string(),
        ));
    }

    let remote = &config.engine.remote_url;
    if !remote.starts_with("http://") && !remote.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "engine.remote_url must be an http(s) URL, got {remote}"
        )));
    }

    Ok(())
}
