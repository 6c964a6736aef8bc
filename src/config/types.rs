use crate::node::NodeId;
use serde::Deserialize;

/// Main configuration structure for Rec-Follower
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub roots: Vec<RootEntry>,
}

/// Crawl shape and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of recommendations followed per expanded video
    #[serde(rename = "branching-factor")]
    pub branching_factor: u32,

    /// Depth of the leaves of every crawl tree
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Depth from which recommendations are sampled instead of all followed
    #[serde(rename = "sample-threshold-depth")]
    pub sample_threshold_depth: u32,

    /// Whether sampling is applied past the threshold depth
    #[serde(default)]
    pub sampling: bool,

    /// Number of roots crawled concurrently
    #[serde(rename = "max-concurrent-crawls", default = "default_concurrent_crawls")]
    pub max_concurrent_crawls: u32,

    /// Wall-clock limit for a single crawl, in seconds
    #[serde(rename = "crawl-timeout-secs", default)]
    pub crawl_timeout_secs: Option<u64>,

    /// Seed for the sampling RNG; random when absent
    #[serde(rename = "sampling-seed", default)]
    pub sampling_seed: Option<u64>,
}

/// Retry behavior for page fetching and parsing
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Fixed delay between network attempts (milliseconds)
    #[serde(rename = "network-backoff-ms", default = "default_network_backoff_ms")]
    pub network_backoff_ms: u64,

    /// Number of parse attempts before a short recommendation list is accepted
    #[serde(rename = "parse-attempts", default = "default_parse_attempts")]
    pub parse_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            network_backoff_ms: default_network_backoff_ms(),
            parse_attempts: default_parse_attempts(),
        }
    }
}

/// Metadata batching and quota configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Videos requested per metadata batch
    #[serde(rename = "video-batch-size", default = "default_video_batch_size")]
    pub video_batch_size: usize,

    /// Channels requested per metadata batch
    #[serde(rename = "channel-batch-size", default = "default_channel_batch_size")]
    pub channel_batch_size: usize,

    /// Attempts per batch before falling back to per-id requests
    #[serde(rename = "batch-attempts", default = "default_batch_attempts")]
    pub batch_attempts: u32,

    /// Quota units available to one run of the crawler
    #[serde(rename = "daily-quota", default = "default_daily_quota")]
    pub daily_quota: u64,

    /// Quota units charged per metadata batch
    #[serde(rename = "cost-per-batch", default = "default_cost_per_batch")]
    pub cost_per_batch: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            video_batch_size: default_video_batch_size(),
            channel_batch_size: default_channel_batch_size(),
            batch_attempts: default_batch_attempts(),
            daily_quota: default_daily_quota(),
            cost_per_batch: default_cost_per_batch(),
        }
    }
}

/// Page fetching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Site root that watch and channel pages are requested from
    #[serde(rename = "base-url")]
    pub base_url: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A labelled group of root videos
///
/// Roots are listed under `videos`, found by searching the site for `query`,
/// or both.
#[derive(Debug, Clone, Deserialize)]
pub struct RootEntry {
    /// Search query, and the label every root of the group is saved under
    pub query: String,

    /// Videos to crawl from
    #[serde(default)]
    pub videos: Vec<NodeId>,

    /// Number of search results for `query` to crawl from as well
    #[serde(rename = "max-results", default)]
    pub max_results: Option<usize>,
}

fn default_concurrent_crawls() -> u32 {
    1
}

fn default_network_backoff_ms() -> u64 {
    1000
}

fn default_parse_attempts() -> u32 {
    10
}

fn default_video_batch_size() -> usize {
    45
}

fn default_channel_batch_size() -> usize {
    50
}

fn default_batch_attempts() -> u32 {
    10
}

fn default_daily_quota() -> u64 {
    10_000
}

fn default_cost_per_batch() -> u64 {
    5
}
