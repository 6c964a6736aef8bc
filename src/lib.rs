//! Rec-Follower: a recommendation tree crawler
//!
//! This crate explores the "recommended next" graph of a video site from a set
//! of root videos, recording a bounded-depth, bounded-branching sample of that
//! graph per root. Offline, it reconstructs best-effort complete trees from the
//! truncated samples by splicing in out-edges observed in other crawls.

pub mod completion;
pub mod config;
pub mod crawler;
pub mod metadata;
pub mod node;
pub mod output;
pub mod policy;
pub mod search;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Rec-Follower operations
#[derive(Debug, Error)]
pub enum FollowerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid node id: {0}")]
    NodeId(#[from] NodeIdError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] metadata::MetadataError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Root video {root} is unavailable")]
    UnavailableRoot { root: node::NodeId },

    #[error("Quota exhausted: {used} of {limit} units used")]
    QuotaExhausted { used: u64, limit: u64 },

    #[error("Cancelled while fetching {target}")]
    Cancelled { target: String },

    #[error("Crawl from {root} timed out after {secs}s")]
    CrawlTimeout { root: node::NodeId, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Node id errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("Node id cannot be empty")]
    Empty,

    #[error("Node id {0:?} contains whitespace or control characters")]
    InvalidCharacter(String),
}

/// Result type alias for Rec-Follower operations
pub type Result<T> = std::result::Result<T, FollowerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use completion::{EdgeCorpus, TreeCompleter};
pub use config::Config;
pub use crawler::{Coordinator, PageFetcher, TreeCrawler};
pub use node::NodeId;
pub use search::{CrawlParams, SearchRecord, SearchTree};
