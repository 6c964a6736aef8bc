//! Breadth-first crawl of a single recommendation tree
//!
//! For each dequeued node:
//! 1. Leaves (`depth == max_depth`) are recorded with no out-edges and never fetched
//! 2. The page is fetched under the network retry policy
//! 3. Recommendations are extracted under the parse retry policy
//! 4. The sampling policy thins them out past the threshold depth
//! 5. The record is stored and unvisited recommendations are enqueued

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::scheduler::{LevelFrontier, QueuedNode};
use crate::node::NodeId;
use crate::policy::{RetryPolicy, SamplingPolicy};
use crate::search::{CrawlParams, SearchRecord, SearchTree};
use crate::FollowerError;
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Crawls one tree from a root node
#[derive(Clone)]
pub struct TreeCrawler {
    fetcher: Arc<dyn PageFetcher>,
    params: CrawlParams,
    retry: RetryPolicy,
    sampling: SamplingPolicy,
}

impl TreeCrawler {
    /// Creates a crawler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Where pages come from
    /// * `params` - Shape of every tree this crawler produces
    /// * `retry` - Retry policy for fetching and parsing
    pub fn new(fetcher: Arc<dyn PageFetcher>, params: CrawlParams, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            params,
            retry,
            sampling: SamplingPolicy::from_params(&params),
        }
    }

    pub fn params(&self) -> &CrawlParams {
        &self.params
    }

    /// Crawls the tree rooted at `root`
    ///
    /// Nodes are expanded strictly level by level. A node rediscovered by the
    /// same tree is recorded as an out-edge of every parent that recommended
    /// it but expanded only once.
    ///
    /// # Arguments
    ///
    /// * `root` - The root video
    /// * `rng` - Randomness for the sampling policy
    /// * `cancel` - Stops the crawl when cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(SearchTree)` - One record per expanded node, in level order
    /// * `Err(FollowerError::Cancelled)` - The token fired mid-crawl
    pub async fn crawl<R>(
        &self,
        root: NodeId,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<SearchTree, FollowerError>
    where
        R: Rng + Send,
    {
        tracing::info!(
            "Crawling tree from {} (n={}, d={}, c={}, sampling={})",
            root,
            self.params.branching_factor,
            self.params.max_depth,
            self.params.sample_threshold_depth,
            self.params.sampling_enabled
        );

        let mut frontier = LevelFrontier::new(root.clone());
        let mut records = Vec::new();

        while let Some(QueuedNode { node_id, depth }) = frontier.next_node() {
            if depth >= self.params.max_depth {
                records.push(SearchRecord::leaf(node_id, depth));
                continue;
            }

            let recommendations = self.expand(&node_id, cancel).await?;
            let kept = self.sampling.apply(&recommendations, depth, false, rng);
            let enqueued = frontier.enqueue_children(&kept, depth);

            tracing::debug!(
                "Expanded {} at depth {}: {} recommendations, {} kept, {} new, {} pending",
                node_id,
                depth,
                recommendations.len(),
                kept.len(),
                enqueued,
                frontier.pending()
            );

            records.push(SearchRecord {
                node_id,
                depth,
                out_edges: kept,
            });
        }

        tracing::debug!(
            "Frontier for {} is {} after claiming {} nodes",
            root,
            frontier.phase(),
            frontier.visited().len()
        );

        let tree = SearchTree::new(root, self.params, records);
        tracing::info!(
            "Finished tree from {}: {} nodes, {} edges",
            tree.root(),
            tree.len(),
            tree.edge_count()
        );
        Ok(tree)
    }

    /// Fetches and parses the recommendations of one node
    ///
    /// A page that definitively does not exist yields no recommendations.
    async fn expand(
        &self,
        node_id: &NodeId,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FollowerError> {
        let fetcher = Arc::clone(&self.fetcher);
        let page = self
            .retry
            .retry_network(node_id, cancel, || {
                let fetcher = Arc::clone(&fetcher);
                let node_id = node_id.clone();
                async move {
                    match fetcher.fetch_page(&node_id).await {
                        Ok(page) => Ok(Some(page)),
                        Err(e) if !e.is_retryable() => Ok(None),
                        Err(e) => Err(e),
                    }
                }
            })
            .await?;

        let Some(page) = page else {
            tracing::warn!("Page for {} no longer exists; recording no out-edges", node_id);
            return Ok(Vec::new());
        };

        let limit = self.params.branching_factor as usize;
        Ok(self.retry.retry_parse(node_id, limit, |attempt| {
            self.fetcher
                .extract_recommendations(node_id, &page, limit, attempt)
        }))
    }
}
