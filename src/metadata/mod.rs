//! Video and channel metadata
//!
//! Metadata is gathered after a crawl for every video the crawl mentioned
//! and every channel those videos belong to. Lookups go through the
//! `MetadataService` seam:
//!
//! - `MetadataFetcher` batches ids and falls back to per-id requests
//! - `ScrapedMetadataService` reads metadata from watch and channel pages
//!   and root videos from search result pages

mod batch;
mod scraped;

pub use batch::MetadataFetcher;
pub use scraped::ScrapedMetadataService;

use crate::node::NodeId;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors returned by a metadata service
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The request may succeed if repeated
    #[error("Transient metadata failure: {0}")]
    Transient(String),

    /// The service refuses further requests for this run
    #[error("Metadata quota exceeded")]
    QuotaExceeded,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MetadataError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

/// Attributes of one video
///
/// Every attribute is optional; services fill in what they can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub video_id: NodeId,
    pub title: Option<String>,
    pub postdate: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub channel_id: Option<String>,
    pub likes: Option<u64>,
    pub dislikes: Option<u64>,
    pub views: Option<u64>,
    pub n_comments: Option<u64>,
}

impl VideoMetadata {
    pub fn new(video_id: NodeId) -> Self {
        Self {
            video_id,
            title: None,
            postdate: None,
            description: None,
            category: None,
            channel_id: None,
            likes: None,
            dislikes: None,
            views: None,
            n_comments: None,
        }
    }
}

/// Attributes of one channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub channel_id: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub date_created: Option<String>,
    pub n_subscribers: Option<u64>,
    pub n_videos: Option<u64>,
    pub n_views: Option<u64>,
    pub categories: Vec<String>,
}

impl ChannelMetadata {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }
}

/// Source of video and channel metadata
///
/// Batch lookups omit ids the service does not know; absence is not an
/// error.
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Whether a video is still available
    async fn video_exists(&self, video_id: &NodeId) -> Result<bool, MetadataError>;

    /// Up to `max_results` videos the site returns for `query`, best first
    async fn search_roots(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<NodeId>, MetadataError>;

    /// Metadata for a batch of videos
    async fn video_batch(
        &self,
        video_ids: &[NodeId],
    ) -> Result<HashMap<NodeId, VideoMetadata>, MetadataError>;

    /// Metadata for a batch of channels
    async fn channel_batch(
        &self,
        channel_ids: &[String],
    ) -> Result<HashMap<String, ChannelMetadata>, MetadataError>;
}
