//! Metadata read from public watch and channel pages
//!
//! Watch pages carry schema.org microdata and OpenGraph tags:
//!
//! | Field       | Tags tried, in order                                         |
//! |-------------|--------------------------------------------------------------|
//! | title       | `meta[itemprop=name]`, `meta[property=og:title]`             |
//! | postdate    | `meta[itemprop=datePublished]`, `meta[itemprop=uploadDate]`  |
//! | description | `meta[itemprop=description]`, `meta[property=og:description]`|
//! | category    | `meta[itemprop=genre]`                                       |
//! | channel_id  | `meta[itemprop=channelId]`                                   |
//! | views       | `meta[itemprop=interactionCount]`                            |
//!
//! Like and comment counts are not exposed this way and stay empty.
//!
//! Search result pages (`/results?search_query=...`) are read for root
//! videos. The first of these selectors that matches anything wins:
//! `a#video-title`, `.yt-lockup-dismissable a`, then any watch link.

use crate::config::Config;
use crate::crawler::{build_http_client, get_page, FetchError};
use crate::metadata::{ChannelMetadata, MetadataError, MetadataService, VideoMetadata};
use crate::node::{from_watch_href, watch_url, NodeId};
use crate::FollowerError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

const SEARCH_RESULT_SELECTORS: [&str; 3] = [
    "a#video-title[href]",
    ".yt-lockup-dismissable a[href]",
    r#"a[href*="watch?v="]"#,
];

/// `MetadataService` that scrapes page meta tags
#[derive(Debug, Clone)]
pub struct ScrapedMetadataService {
    client: Client,
    base_url: Url,
}

impl ScrapedMetadataService {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds the service from the `[fetcher]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, FollowerError> {
        let client = build_http_client(&config.user_agent)?;
        let base_url = Url::parse(&config.fetcher.base_url)?;
        Ok(Self::new(client, base_url))
    }

    /// Fetches a page, treating a missing page as `None`
    async fn fetch_optional(&self, url: Url) -> Result<Option<String>, MetadataError> {
        match get_page(&self.client, url).await {
            Ok(page) => Ok(Some(page)),
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(FetchError::RateLimited) => Err(MetadataError::QuotaExceeded),
            Err(FetchError::Transient(reason)) => Err(MetadataError::Transient(reason)),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, MetadataError> {
        let mut url = self
            .base_url
            .join("/results")
            .map_err(|e| MetadataError::Transient(format!("cannot build search URL: {}", e)))?;
        url.query_pairs_mut().append_pair("search_query", query);
        Ok(url)
    }

    fn channel_url(&self, channel_id: &str) -> Result<Url, MetadataError> {
        self.base_url
            .join(&format!("/channel/{}", channel_id))
            .map_err(|e| MetadataError::Transient(format!("cannot build channel URL: {}", e)))
    }
}

#[async_trait]
impl MetadataService for ScrapedMetadataService {
    async fn video_exists(&self, video_id: &NodeId) -> Result<bool, MetadataError> {
        let url = watch_url(&self.base_url, video_id)
            .map_err(|e| MetadataError::Transient(format!("cannot build watch URL: {}", e)))?;
        Ok(self.fetch_optional(url).await?.is_some())
    }

    async fn search_roots(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<NodeId>, MetadataError> {
        let url = self.search_url(query)?;
        Ok(self
            .fetch_optional(url)
            .await?
            .map(|page| parse_search_results(&page, max_results))
            .unwrap_or_default())
    }

    async fn video_batch(
        &self,
        video_ids: &[NodeId],
    ) -> Result<HashMap<NodeId, VideoMetadata>, MetadataError> {
        let mut result = HashMap::with_capacity(video_ids.len());

        for video_id in video_ids {
            let url = watch_url(&self.base_url, video_id)
                .map_err(|e| MetadataError::Transient(format!("cannot build watch URL: {}", e)))?;
            match self.fetch_optional(url).await? {
                Some(page) => {
                    result.insert(video_id.clone(), parse_video_page(video_id, &page));
                }
                None => tracing::debug!("Video {} is unavailable", video_id),
            }
        }

        Ok(result)
    }

    async fn channel_batch(
        &self,
        channel_ids: &[String],
    ) -> Result<HashMap<String, ChannelMetadata>, MetadataError> {
        let mut result = HashMap::with_capacity(channel_ids.len());

        for channel_id in channel_ids {
            let url = self.channel_url(channel_id)?;
            match self.fetch_optional(url).await? {
                Some(page) => {
                    result.insert(channel_id.clone(), parse_channel_page(channel_id, &page));
                }
                None => tracing::debug!("Channel {} is unavailable", channel_id),
            }
        }

        Ok(result)
    }
}

/// Reads video metadata from a watch page
pub fn parse_video_page(video_id: &NodeId, html: &str) -> VideoMetadata {
    let document = Html::parse_document(html);

    VideoMetadata {
        video_id: video_id.clone(),
        title: meta_content(&document, &["meta[itemprop='name']", "meta[property='og:title']"]),
        postdate: meta_content(
            &document,
            &["meta[itemprop='datePublished']", "meta[itemprop='uploadDate']"],
        ),
        description: meta_content(
            &document,
            &["meta[itemprop='description']", "meta[property='og:description']"],
        ),
        category: meta_content(&document, &["meta[itemprop='genre']"]),
        channel_id: meta_content(&document, &["meta[itemprop='channelId']"]),
        likes: None,
        dislikes: None,
        views: meta_content(&document, &["meta[itemprop='interactionCount']"])
            .and_then(|s| parse_count(&s)),
        n_comments: None,
    }
}

/// Reads channel metadata from a channel page
pub fn parse_channel_page(channel_id: &str, html: &str) -> ChannelMetadata {
    let document = Html::parse_document(html);

    let categories = meta_content(&document, &["meta[name='keywords']"])
        .map(|keywords| {
            keywords
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    ChannelMetadata {
        channel_id: channel_id.to_string(),
        name: meta_content(&document, &["meta[itemprop='name']", "meta[property='og:title']"]),
        country: meta_content(&document, &["meta[itemprop='addressCountry']"]),
        date_created: meta_content(&document, &["meta[itemprop='dateCreated']"]),
        n_subscribers: meta_content(&document, &["meta[itemprop='subscriberCount']"])
            .and_then(|s| parse_count(&s)),
        n_videos: meta_content(&document, &["meta[itemprop='videoCount']"])
            .and_then(|s| parse_count(&s)),
        n_views: meta_content(&document, &["meta[itemprop='interactionCount']"])
            .and_then(|s| parse_count(&s)),
        categories,
    }
}

/// Reads the result videos of a search page, in page order
pub fn parse_search_results(html: &str, max_results: usize) -> Vec<NodeId> {
    let document = Html::parse_document(html);

    for raw in SEARCH_RESULT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let mut seen = HashSet::new();
        let found: Vec<NodeId> = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(from_watch_href)
            .filter(|id| seen.insert(id.clone()))
            .take(max_results)
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    Vec::new()
}

/// First non-empty `content` attribute among the selectors
fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("content"))
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty())
    })
}

/// Parses a human-formatted count such as `1,234,567 views`
fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
