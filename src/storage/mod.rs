//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Crawl output (searches, search records, metadata) persistence
//! - Completed tree persistence
//! - Statistics queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::metadata::{ChannelMetadata, VideoMetadata};
use crate::node::NodeId;
use crate::search::{CrawlParams, SearchTree};
use crate::FollowerError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// Missing parent directories are created.
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(FollowerError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, FollowerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// A stored search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRun {
    pub search_id: i64,
    pub query: String,
    pub root: NodeId,
    pub params: CrawlParams,
    pub created_at: String,
    pub config_hash: String,
}

/// Everything one finished crawl writes
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    /// Label the root was chosen under
    pub query: String,

    /// The crawled tree
    pub tree: SearchTree,

    /// Hash of the configuration the crawl ran under
    pub config_hash: String,

    /// Metadata of videos not stored before
    pub videos: Vec<VideoMetadata>,

    /// Metadata of channels not stored before
    pub channels: Vec<ChannelMetadata>,
}
