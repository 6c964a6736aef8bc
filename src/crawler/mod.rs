//! Crawler module for recommendation tree crawling
//!
//! This module contains the core crawling logic, including:
//! - Page fetching behind the `PageFetcher` seam
//! - Recommendation extraction from watch pages
//! - Level-by-level scheduling of a single tree
//! - Quota accounting and coordination of many roots

mod coordinator;
mod fetcher;
mod parser;
mod quota;
mod scheduler;
mod tree;

pub use coordinator::{Coordinator, CrawlReport, CrawlTarget, HaltReason, PlannedCrawl};
pub use fetcher::{build_http_client, get_page, FetchError, HttpPageFetcher, PageFetcher};
pub use parser::{extract_recommendations, RecommendationStrategy};
pub use quota::{estimate_crawl_cost, QuotaBudget};
pub use scheduler::{LevelFrontier, QueuedNode};
pub use tree::TreeCrawler;

use crate::config::Config;
use crate::FollowerError;
use tokio_util::sync::CancellationToken;

/// Crawls every configured root over HTTP
///
/// This is the main entry point for a crawl run. It will:
/// 1. Open the storage layer
/// 2. Build the HTTP page fetcher and metadata service
/// 3. Search the site for the roots of entries that set `max-results`
/// 4. Crawl each root not crawled before (every root if `fresh`)
/// 5. Store each finished tree with its metadata
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash recorded on every search written
/// * `fresh` - Crawl roots even if their search already exists
/// * `cancel` - Stops the run when cancelled
///
/// # Returns
///
/// * `Ok(CrawlReport)` - What happened to each root
/// * `Err(FollowerError)` - The run could not start or storage failed
pub async fn crawl(
    config: &Config,
    config_hash: String,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<CrawlReport, FollowerError> {
    let coordinator = Coordinator::from_config(config, config_hash)?;
    let targets = coordinator.resolve_targets(&config.roots, &cancel).await?;
    coordinator.run(targets, fresh, cancel).await
}
