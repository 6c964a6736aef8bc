//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::completion::CompletedRow;
use crate::metadata::{ChannelMetadata, VideoMetadata};
use crate::node::NodeId;
use crate::search::SearchTree;
use crate::storage::{CrawlOutput, SearchRun};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Search not found: {0}")]
    SearchNotFound(i64),

    #[error("Invalid node id stored in database: {0}")]
    InvalidNodeId(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Crawl output is append-only: a crawl's search row, records and metadata
/// are written together or not at all. Completed trees are the only data
/// ever replaced.
pub trait Storage {
    // ===== Searches =====

    /// Persists one finished crawl in a single transaction
    ///
    /// # Arguments
    ///
    /// * `output` - The crawl tree plus the metadata gathered for it
    ///
    /// # Returns
    ///
    /// The ID of the newly created search
    fn save_crawl(&mut self, output: &CrawlOutput) -> StorageResult<i64>;

    /// Returns true if a search for `root` under `query` was already stored
    fn search_exists(&self, query: &str, root: &NodeId) -> StorageResult<bool>;

    /// Gets a search by ID
    fn get_search(&self, search_id: i64) -> StorageResult<SearchRun>;

    /// Lists every stored search, oldest first
    fn list_searches(&self) -> StorageResult<Vec<SearchRun>>;

    // ===== Search Records =====

    /// Loads the tree recorded by one search
    fn load_search_tree(&self, search_id: i64) -> StorageResult<SearchTree>;

    /// Loads the trees of every search, oldest first
    fn load_all_search_trees(&self) -> StorageResult<Vec<(SearchRun, SearchTree)>>;

    // ===== Metadata =====

    /// Returns the ids in `video_ids` that have no stored metadata
    fn filter_unknown_videos(&self, video_ids: &[NodeId]) -> StorageResult<Vec<NodeId>>;

    /// Returns the ids in `channel_ids` that have no stored metadata
    fn filter_unknown_channels(&self, channel_ids: &[String]) -> StorageResult<Vec<String>>;

    /// Gets the stored metadata of a video
    fn get_video(&self, video_id: &NodeId) -> StorageResult<Option<VideoMetadata>>;

    /// Gets the stored metadata of a channel
    fn get_channel(&self, channel_id: &str) -> StorageResult<Option<ChannelMetadata>>;

    // ===== Completed Trees =====

    /// Replaces the completed tree of a search
    fn save_completed_tree(&mut self, search_id: i64, rows: &[CompletedRow])
        -> StorageResult<()>;

    /// Loads the completed tree of a search, sorted by depth then video
    fn load_completed_tree(&self, search_id: i64) -> StorageResult<Vec<CompletedRow>>;

    // ===== Statistics =====

    /// Gets total search count
    fn count_searches(&self) -> StorageResult<u64>;

    /// Counts expanded nodes across all searches (leaves included)
    fn count_expanded_nodes(&self) -> StorageResult<u64>;

    /// Counts recorded out-edges across all searches
    fn count_edges(&self) -> StorageResult<u64>;

    /// Counts videos with stored metadata
    fn count_videos(&self) -> StorageResult<u64>;

    /// Counts channels with stored metadata
    fn count_channels(&self) -> StorageResult<u64>;

    /// Counts searches that have a completed tree
    fn count_completed_searches(&self) -> StorageResult<u64>;

    /// Counts rows across all completed trees
    fn count_completed_rows(&self) -> StorageResult<u64>;

    /// Gets expanded node count breakdown by depth
    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>>;
}
