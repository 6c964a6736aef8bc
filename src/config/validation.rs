use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, MetadataConfig, OutputConfig, RetryConfig, RootEntry,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_metadata_config(&config.metadata)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_roots(&config.roots)?;
    Ok(())
}

/// Validates crawl shape configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.branching_factor < 1 {
        return Err(ConfigError::Validation(
            "branching_factor must be >= 1".to_string(),
        ));
    }

    if config.max_depth < 1 {
        return Err(ConfigError::Validation("max_depth must be >= 1".to_string()));
    }

    if config.sample_threshold_depth > config.max_depth {
        return Err(ConfigError::Validation(format!(
            "sample_threshold_depth ({}) cannot exceed max_depth ({})",
            config.sample_threshold_depth, config.max_depth
        )));
    }

    if config.max_concurrent_crawls < 1 || config.max_concurrent_crawls > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_crawls must be between 1 and 32, got {}",
            config.max_concurrent_crawls
        )));
    }

    if config.crawl_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl_timeout_secs must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.parse_attempts < 1 {
        return Err(ConfigError::Validation(
            "parse_attempts must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates metadata batching configuration
fn validate_metadata_config(config: &MetadataConfig) -> Result<(), ConfigError> {
    // 50 ids per request is the upper limit of the metadata endpoints
    for (name, size) in [
        ("video_batch_size", config.video_batch_size),
        ("channel_batch_size", config.channel_batch_size),
    ] {
        if size < 1 || size > 50 {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 50, got {}",
                name, size
            )));
        }
    }

    if config.batch_attempts < 1 {
        return Err(ConfigError::Validation(
            "batch_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the fetcher base URL
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Largest number of search results one root entry may ask for
const MAX_SEARCH_RESULTS: usize = 50;

/// Validates root entries
fn validate_roots(roots: &[RootEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in roots {
        if entry.query.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Root query label cannot be empty".to_string(),
            ));
        }

        match entry.max_results {
            None if entry.videos.is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "Root entry '{}' must list videos or set max-results",
                    entry.query
                )));
            }
            Some(max) if max == 0 || max > MAX_SEARCH_RESULTS => {
                return Err(ConfigError::Validation(format!(
                    "Root entry '{}': max-results must be between 1 and {}",
                    entry.query, MAX_SEARCH_RESULTS
                )));
            }
            _ => {}
        }

        for video in &entry.videos {
            if !seen.insert((entry.query.as_str(), video.as_str())) {
                return Err(ConfigError::Validation(format!(
                    "Root '{}' is listed twice under query '{}'",
                    video, entry.query
                )));
            }
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
