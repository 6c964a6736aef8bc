//! Page fetching
//!
//! This module handles:
//! - Building HTTP clients with proper user agent strings
//! - The `PageFetcher` seam the tree crawler fetches through
//! - Classifying HTTP failures into retryable and definitive ones
//!
//! | Condition                 | Result                     |
//! |---------------------------|----------------------------|
//! | HTTP 2xx                  | page body                  |
//! | HTTP 404 / 410            | `FetchError::NotFound`     |
//! | HTTP 429                  | `FetchError::RateLimited`  |
//! | HTTP 5xx, other statuses  | `FetchError::Transient`    |
//! | Timeout, connection error | `FetchError::Transient`    |

use crate::config::{Config, UserAgentConfig};
use crate::crawler::parser::{extract_recommendations, RecommendationStrategy};
use crate::node::{watch_url, NodeId};
use crate::FollowerError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure to fetch a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request may succeed if repeated
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The site asked us to slow down
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// The page definitively does not exist
    #[error("page not found (HTTP {0})")]
    NotFound(u16),
}

impl FetchError {
    /// Returns true if repeating the request can change the outcome
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Source of recommendation pages
///
/// Fetching and extraction are split so the crawler can retry them under
/// different policies: fetches are retried until they succeed, extraction is
/// retried a bounded number of times on the same page with a varying
/// strategy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the page of `node_id`
    async fn fetch_page(&self, node_id: &NodeId) -> Result<String, FetchError>;

    /// Extracts up to `limit` recommendations from a fetched page
    ///
    /// `attempt` counts parse attempts on the same page, starting at 0.
    fn extract_recommendations(
        &self,
        node_id: &NodeId,
        page: &str,
        limit: usize,
        attempt: u32,
    ) -> Vec<NodeId>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use rec_follower::config::UserAgentConfig;
/// use rec_follower::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "RecFollower".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Gets a page body, classifying failures
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn get_page(client: &Client, url: Url) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transient(describe_transport_error(&e)))?;

    let status = response.status();
    if let Some(error) = classify_status(status) {
        return Err(error);
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Transient(describe_transport_error(&e)))
}

/// Maps a non-success status to a fetch error
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound(status.as_u16()),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        _ => FetchError::Transient(format!("HTTP {}", status.as_u16())),
    })
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    }
}

/// `PageFetcher` backed by watch pages served over HTTP
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
}

impl HttpPageFetcher {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds a fetcher from the `[fetcher]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, FollowerError> {
        let client = build_http_client(&config.user_agent)?;
        let base_url = Url::parse(&config.fetcher.base_url)?;
        Ok(Self::new(client, base_url))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, node_id: &NodeId) -> Result<String, FetchError> {
        let url = watch_url(&self.base_url, node_id)
            .map_err(|e| FetchError::Transient(format!("cannot build watch URL: {}", e)))?;
        tracing::trace!("GET {}", url);
        get_page(&self.client, url).await
    }

    fn extract_recommendations(
        &self,
        node_id: &NodeId,
        page: &str,
        limit: usize,
        attempt: u32,
    ) -> Vec<NodeId> {
        extract_recommendations(
            page,
            node_id,
            limit,
            RecommendationStrategy::for_attempt(attempt),
        )
    }
}
