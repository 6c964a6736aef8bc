//! Crawl coordinator - runs the crawls of every configured root
//!
//! This module handles:
//! - Expanding root groups into targets, searching the site where asked
//! - Skipping roots whose search already exists
//! - Detecting unavailable roots before any page is fetched
//! - Reserving metadata quota and halting once it runs out
//! - Running roots concurrently, bounded by `max-concurrent-crawls`
//! - Fetching metadata for newly seen videos and channels
//! - Writing each finished crawl in a single transaction

use crate::config::{Config, MetadataConfig, RootEntry};
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher};
use crate::crawler::quota::{estimate_crawl_cost, QuotaBudget};
use crate::crawler::tree::TreeCrawler;
use crate::metadata::{
    ChannelMetadata, MetadataError, MetadataFetcher, MetadataService, ScrapedMetadataService,
    VideoMetadata,
};
use crate::node::NodeId;
use crate::policy::RetryPolicy;
use crate::search::CrawlParams;
use crate::storage::{open_storage, CrawlOutput, SqliteStorage, Storage, StorageError, StorageResult};
use crate::FollowerError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One root to crawl, with the label it was chosen under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub query: String,
    pub root: NodeId,
}

impl CrawlTarget {
    pub fn new(query: impl Into<String>, root: NodeId) -> Self {
        Self {
            query: query.into(),
            root,
        }
    }

    /// Flattens the listed videos of configured root groups, in file order
    ///
    /// Roots found by searching are added by `Coordinator::resolve_targets`.
    pub fn from_roots(roots: &[RootEntry]) -> Vec<Self> {
        roots
            .iter()
            .flat_map(|entry| {
                entry
                    .videos
                    .iter()
                    .map(move |video| Self::new(entry.query.clone(), video.clone()))
            })
            .collect()
    }
}

/// Why a run stopped starting new crawls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    QuotaExhausted { used: u64, limit: u64 },
}

/// Outcome of one run over a set of roots
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Crawls written to storage, with their search ids
    pub completed: Vec<(CrawlTarget, i64)>,

    /// Roots whose search already existed
    pub skipped_existing: Vec<CrawlTarget>,

    /// Roots the metadata service reported as gone
    pub unavailable_roots: Vec<CrawlTarget>,

    /// Crawls that failed, with the error message
    pub failed: Vec<(CrawlTarget, String)>,

    /// Roots never started because the run halted or was cancelled
    pub not_started: Vec<CrawlTarget>,

    /// Set when the run stopped early
    pub halted: Option<HaltReason>,
}

impl CrawlReport {
    /// Logs a one-line summary followed by one line per problem root
    pub fn log_summary(&self) {
        tracing::info!(
            "Crawl run finished: {} completed, {} skipped, {} unavailable, {} failed, {} not started",
            self.completed.len(),
            self.skipped_existing.len(),
            self.unavailable_roots.len(),
            self.failed.len(),
            self.not_started.len()
        );
        for target in &self.unavailable_roots {
            tracing::warn!("Root {} ({}) is unavailable", target.root, target.query);
        }
        for (target, error) in &self.failed {
            tracing::error!("Crawl from {} ({}) failed: {}", target.root, target.query, error);
        }
        if let Some(HaltReason::QuotaExhausted { used, limit }) = &self.halted {
            tracing::warn!("Run halted: quota exhausted ({} of {} units)", used, limit);
        }
    }
}

/// What a run would do for one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCrawl {
    pub target: CrawlTarget,
    pub already_exists: bool,
    pub estimated_cost: u64,
}

/// Main crawl coordinator structure
pub struct Coordinator {
    fetcher: Arc<dyn PageFetcher>,
    metadata: MetadataFetcher,
    storage: Arc<Mutex<SqliteStorage>>,
    params: CrawlParams,
    retry: RetryPolicy,
    metadata_config: MetadataConfig,
    max_concurrent: usize,
    crawl_timeout: Option<Duration>,
    sampling_seed: Option<u64>,
    config_hash: String,
    budget: Arc<QuotaBudget>,
}

impl Coordinator {
    /// Creates a coordinator from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash recorded on every search this coordinator writes
    /// * `fetcher` - Source of recommendation pages
    /// * `metadata` - Source of video and channel metadata
    /// * `storage` - Where finished crawls are written
    pub fn new(
        config: &Config,
        config_hash: String,
        fetcher: Arc<dyn PageFetcher>,
        metadata: Arc<dyn MetadataService>,
        storage: Arc<Mutex<SqliteStorage>>,
    ) -> Self {
        Self {
            fetcher,
            metadata: MetadataFetcher::new(metadata, &config.metadata),
            storage,
            params: CrawlParams::from(&config.crawler),
            retry: RetryPolicy::from_config(&config.retry),
            metadata_config: config.metadata.clone(),
            max_concurrent: config.crawler.max_concurrent_crawls.max(1) as usize,
            crawl_timeout: config.crawler.crawl_timeout_secs.map(Duration::from_secs),
            sampling_seed: config.crawler.sampling_seed,
            config_hash,
            budget: Arc::new(QuotaBudget::new(config.metadata.daily_quota)),
        }
    }

    /// Creates a coordinator that crawls the configured site over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and HTTP clients built
    /// * `Err(FollowerError)` - Failed to initialize
    pub fn from_config(config: &Config, config_hash: String) -> Result<Self, FollowerError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let fetcher = Arc::new(HttpPageFetcher::from_config(config)?);
        let metadata = Arc::new(ScrapedMetadataService::from_config(config)?);
        Ok(Self::new(
            config,
            config_hash,
            fetcher,
            metadata,
            Arc::new(Mutex::new(storage)),
        ))
    }

    /// Shared handle on the storage this coordinator writes to
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    pub fn params(&self) -> &CrawlParams {
        &self.params
    }

    /// Expands configured root groups into crawl targets
    ///
    /// Each group contributes its listed videos, then the results of
    /// searching its query when it sets `max-results`. A root found twice
    /// under the same query is crawled once.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlTarget>)` - Targets in file order
    /// * `Err(FollowerError::QuotaExhausted)` - The service refused a search
    /// * `Err(FollowerError::Cancelled)` - `cancel` fired while searching
    pub async fn resolve_targets(
        &self,
        roots: &[RootEntry],
        cancel: &CancellationToken,
    ) -> Result<Vec<CrawlTarget>, FollowerError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for entry in roots {
            let mut videos = entry.videos.clone();
            if let Some(max_results) = entry.max_results {
                let found = self.search_roots(&entry.query, max_results, cancel).await?;
                if found.is_empty() {
                    tracing::warn!("Search for '{}' returned no videos", entry.query);
                } else {
                    tracing::info!("Search for '{}' found {} roots", entry.query, found.len());
                }
                videos.extend(found);
            }

            for video in videos {
                if seen.insert((entry.query.clone(), video.clone())) {
                    targets.push(CrawlTarget::new(entry.query.clone(), video));
                }
            }
        }

        Ok(targets)
    }

    async fn search_roots(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FollowerError> {
        let service = self.metadata.service();
        settle_metadata(&self.retry, query, cancel, move || {
            service.search_roots(query, max_results)
        })
        .await?
        .map_err(|e| metadata_failure(&self.budget, e))
    }

    /// Describes what `run` would do without fetching anything
    pub fn plan(
        &self,
        targets: &[CrawlTarget],
        fresh: bool,
    ) -> Result<Vec<PlannedCrawl>, FollowerError> {
        let estimated_cost = estimate_crawl_cost(&self.params, &self.metadata_config);
        targets
            .iter()
            .map(|target| {
                let already_exists = !fresh
                    && with_storage(&self.storage, |s| {
                        s.search_exists(&target.query, &target.root)
                    })?;
                Ok(PlannedCrawl {
                    target: target.clone(),
                    already_exists,
                    estimated_cost,
                })
            })
            .collect()
    }

    /// Crawls every target
    ///
    /// Crawl-level failures are reported per root and never abort the run.
    /// Once the quota is exhausted no further crawls start; those already
    /// running finish.
    ///
    /// # Arguments
    ///
    /// * `targets` - Roots to crawl, in order
    /// * `fresh` - Crawl roots even if their search already exists
    /// * `cancel` - Stops every crawl when cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - What happened to each root
    /// * `Err(FollowerError)` - Storage could not be read
    pub async fn run(
        &self,
        targets: Vec<CrawlTarget>,
        fresh: bool,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, FollowerError> {
        let cost = estimate_crawl_cost(&self.params, &self.metadata_config);
        tracing::info!(
            "Starting crawl run: {} roots, {} concurrent, {} quota units reserved per crawl",
            targets.len(),
            self.max_concurrent,
            cost
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut report = CrawlReport::default();

        for (index, target) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() || report.halted.is_some() {
                report.not_started.push(target);
                continue;
            }

            if !fresh
                && with_storage(&self.storage, |s| {
                    s.search_exists(&target.query, &target.root)
                })?
            {
                tracing::info!(
                    "Tree from {} ({}) already exists; skipping",
                    target.root,
                    target.query
                );
                report.skipped_existing.push(target);
                continue;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        report.not_started.push(target);
                        continue;
                    }
                },
                _ = cancel.cancelled() => {
                    report.not_started.push(target);
                    continue;
                }
            };

            // Reserve only once a slot is free
            if let Err(used) = self.budget.try_reserve(cost) {
                tracing::warn!(
                    "Quota exhausted ({} of {} units); not starting {}",
                    used,
                    self.budget.limit(),
                    target.root
                );
                report.halted = Some(HaltReason::QuotaExhausted {
                    used,
                    limit: self.budget.limit(),
                });
                report.not_started.push(target);
                continue;
            }

            let job = self.job(index);
            let token = cancel.child_token();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = job.run(&target, token).await;
                (target, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((target, Ok(search_id))) => {
                    report.completed.push((target, search_id));
                }
                Ok((target, Err(FollowerError::UnavailableRoot { .. }))) => {
                    report.unavailable_roots.push(target);
                }
                Ok((target, Err(e))) => {
                    tracing::error!("Crawl from {} failed: {}", target.root, e);
                    report.failed.push((target, e.to_string()));
                }
                Err(e) => {
                    tracing::error!("Crawl task aborted: {}", e);
                }
            }
        }

        if report.halted.is_none() && self.budget.is_exhausted() {
            report.halted = Some(HaltReason::QuotaExhausted {
                used: self.budget.used(),
                limit: self.budget.limit(),
            });
        }

        report.completed.sort_by_key(|(_, search_id)| *search_id);
        Ok(report)
    }

    fn job(&self, index: usize) -> CrawlJob {
        CrawlJob {
            crawler: TreeCrawler::new(Arc::clone(&self.fetcher), self.params, self.retry.clone()),
            retry: self.retry.clone(),
            metadata: self.metadata.clone(),
            storage: Arc::clone(&self.storage),
            budget: Arc::clone(&self.budget),
            config_hash: self.config_hash.clone(),
            timeout: self.crawl_timeout,
            seed: self
                .sampling_seed
                .map(|seed| seed.wrapping_add(index as u64)),
        }
    }
}

/// Everything one spawned crawl needs
struct CrawlJob {
    crawler: TreeCrawler,
    retry: RetryPolicy,
    metadata: MetadataFetcher,
    storage: Arc<Mutex<SqliteStorage>>,
    budget: Arc<QuotaBudget>,
    config_hash: String,
    timeout: Option<Duration>,
    seed: Option<u64>,
}

impl CrawlJob {
    /// Crawls one root and saves it, returning the new search id
    async fn run(self, target: &CrawlTarget, cancel: CancellationToken) -> Result<i64, FollowerError> {
        if !self.root_available(&target.root, &cancel).await? {
            tracing::warn!("Root {} ({}) is unavailable; skipping", target.root, target.query);
            return Err(FollowerError::UnavailableRoot {
                root: target.root.clone(),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let crawl = self.crawler.crawl(target.root.clone(), &mut rng, &cancel);
        let tree = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, crawl).await {
                Ok(result) => result?,
                Err(_) => {
                    cancel.cancel();
                    return Err(FollowerError::CrawlTimeout {
                        root: target.root.clone(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => crawl.await?,
        };

        let videos = self.fetch_video_metadata(&tree.mentioned_ids()).await?;
        let channel_ids: Vec<String> = videos
            .iter()
            .filter_map(|video| video.channel_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let channels = self.fetch_channel_metadata(&channel_ids).await?;

        tracing::info!(
            "Saving tree from {}: {} nodes, {} new videos, {} new channels",
            target.root,
            tree.len(),
            videos.len(),
            channels.len()
        );

        let output = CrawlOutput {
            query: target.query.clone(),
            tree,
            config_hash: self.config_hash.clone(),
            videos,
            channels,
        };
        with_storage(&self.storage, |s| s.save_crawl(&output))
    }

    /// Asks the metadata service whether `root` still exists
    ///
    /// Transient failures are retried until the crawl is cancelled; any other
    /// service error settles the check.
    async fn root_available(
        &self,
        root: &NodeId,
        cancel: &CancellationToken,
    ) -> Result<bool, FollowerError> {
        let service = self.metadata.service();
        settle_metadata(&self.retry, root, cancel, move || service.video_exists(root))
            .await?
            .map_err(|e| metadata_failure(&self.budget, e))
    }

    async fn fetch_video_metadata(
        &self,
        mentioned: &[NodeId],
    ) -> Result<Vec<VideoMetadata>, FollowerError> {
        let unknown = with_storage(&self.storage, |s| s.filter_unknown_videos(mentioned))?;
        let found = self
            .metadata
            .fetch_videos(&unknown)
            .await
            .map_err(|e| metadata_failure(&self.budget, e))?;

        let mut videos: Vec<VideoMetadata> = found.into_values().collect();
        videos.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(videos)
    }

    async fn fetch_channel_metadata(
        &self,
        channel_ids: &[String],
    ) -> Result<Vec<ChannelMetadata>, FollowerError> {
        let unknown = with_storage(&self.storage, |s| s.filter_unknown_channels(channel_ids))?;
        let found = self
            .metadata
            .fetch_channels(&unknown)
            .await
            .map_err(|e| metadata_failure(&self.budget, e))?;

        let mut channels: Vec<ChannelMetadata> = found.into_values().collect();
        channels.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        Ok(channels)
    }
}

/// Runs a metadata request, retrying transient failures until `cancel` fires
///
/// The inner result is the settled answer of the service: a value or a
/// non-transient error.
async fn settle_metadata<S, T, F, Fut>(
    retry: &RetryPolicy,
    target: &S,
    cancel: &CancellationToken,
    mut request: F,
) -> Result<Result<T, MetadataError>, FollowerError>
where
    S: Display + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MetadataError>>,
{
    retry
        .retry_network(target, cancel, || {
            let attempt = request();
            async move {
                match attempt.await {
                    Err(MetadataError::Transient(reason)) => Err(reason),
                    settled => Ok(settled),
                }
            }
        })
        .await
}

/// Marks the budget exhausted on a quota error
fn metadata_failure(budget: &QuotaBudget, error: MetadataError) -> FollowerError {
    if error.is_quota_exceeded() {
        budget.mark_exhausted();
        FollowerError::QuotaExhausted {
            used: budget.used(),
            limit: budget.limit(),
        }
    } else {
        error.into()
    }
}

/// Runs `f` with the storage locked
///
/// The lock is never held across an await.
fn with_storage<T, F>(storage: &Mutex<SqliteStorage>, f: F) -> Result<T, FollowerError>
where
    F: FnOnce(&mut SqliteStorage) -> StorageResult<T>,
{
    let mut guard = storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
    Ok(f(&mut *guard)?)
}
