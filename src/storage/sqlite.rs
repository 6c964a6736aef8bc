//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::completion::{CompletedRow, VertexId};
use crate::metadata::{ChannelMetadata, VideoMetadata};
use crate::node::NodeId;
use crate::search::{CrawlParams, SearchRecord, SearchTree};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrawlOutput, SearchRun};
use crate::FollowerError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

const SEARCH_COLUMNS: &str = "search_id, query, root_video, n_splits, depth, const_depth, sample, created_at, config_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(FollowerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, FollowerError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, FollowerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_records(&self, search_id: i64) -> StorageResult<Vec<SearchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT video_id, depth, recommendation FROM recommendations
             WHERE search_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![search_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        // Rows are grouped back into records in first-seen order
        let mut records: Vec<SearchRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for row in rows {
            let (video_id, depth, recommendation) = row?;
            let ix = match index.get(&video_id) {
                Some(&ix) => ix,
                None => {
                    records.push(SearchRecord::leaf(parse_node_id(&video_id)?, depth));
                    index.insert(video_id, records.len() - 1);
                    records.len() - 1
                }
            };
            if let Some(recommendation) = recommendation {
                records[ix].out_edges.push(parse_node_id(&recommendation)?);
            }
        }

        Ok(records)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Raw `searches` row, before node id validation
struct SearchRow {
    search_id: i64,
    query: String,
    root_video: String,
    n_splits: u32,
    depth: u32,
    const_depth: u32,
    sample: bool,
    created_at: String,
    config_hash: String,
}

impl SearchRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            search_id: row.get(0)?,
            query: row.get(1)?,
            root_video: row.get(2)?,
            n_splits: row.get(3)?,
            depth: row.get(4)?,
            const_depth: row.get(5)?,
            sample: row.get(6)?,
            created_at: row.get(7)?,
            config_hash: row.get(8)?,
        })
    }

    fn into_run(self) -> StorageResult<SearchRun> {
        Ok(SearchRun {
            search_id: self.search_id,
            query: self.query,
            root: parse_node_id(&self.root_video)?,
            params: CrawlParams {
                branching_factor: self.n_splits,
                max_depth: self.depth,
                sample_threshold_depth: self.const_depth,
                sampling_enabled: self.sample,
            },
            created_at: self.created_at,
            config_hash: self.config_hash,
        })
    }
}

fn parse_node_id(raw: &str) -> StorageResult<NodeId> {
    NodeId::new(raw).map_err(|_| StorageError::InvalidNodeId(raw.to_string()))
}

fn insert_video(stmt: &mut Statement<'_>, search_id: i64, video: &VideoMetadata) -> StorageResult<()> {
    stmt.execute(params![
        video.video_id.as_str(),
        search_id,
        video.title,
        video.postdate,
        video.description,
        video.category,
        video.channel_id,
        count_to_db(video.likes),
        count_to_db(video.dislikes),
        count_to_db(video.views),
        count_to_db(video.n_comments),
    ])?;
    Ok(())
}

fn insert_channel(stmt: &mut Statement<'_>, channel: &ChannelMetadata) -> StorageResult<()> {
    let categories = if channel.categories.is_empty() {
        None
    } else {
        Some(channel.categories.join(","))
    };
    stmt.execute(params![
        channel.channel_id,
        channel.name,
        channel.country,
        channel.date_created,
        count_to_db(channel.n_subscribers),
        count_to_db(channel.n_videos),
        count_to_db(channel.n_views),
        categories,
    ])?;
    Ok(())
}

/// SQLite integers are signed; counts beyond `i64::MAX` are dropped
fn count_to_db(count: Option<u64>) -> Option<i64> {
    count.and_then(|c| i64::try_from(c).ok())
}

fn count_from_db(count: Option<i64>) -> Option<u64> {
    count.and_then(|c| u64::try_from(c).ok())
}

/// Keeps the first occurrence of each id
fn distinct<T: Clone + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

impl Storage for SqliteStorage {
    // ===== Searches =====

    fn save_crawl(&mut self, output: &CrawlOutput) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let crawl_params = output.tree.params();

        tx.execute(
            "INSERT INTO searches (query, root_video, n_splits, depth, const_depth, sample, created_at, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                output.query,
                output.tree.root().as_str(),
                crawl_params.branching_factor,
                crawl_params.max_depth,
                crawl_params.sample_threshold_depth,
                crawl_params.sampling_enabled,
                now,
                output.config_hash,
            ],
        )?;
        let search_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO recommendations (search_id, video_id, depth, position, recommendation)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in output.tree.records() {
                if record.out_edges.is_empty() {
                    stmt.execute(params![
                        search_id,
                        record.node_id.as_str(),
                        record.depth,
                        0u32,
                        Option::<&str>::None
                    ])?;
                    continue;
                }
                for (position, edge) in record.out_edges.iter().enumerate() {
                    stmt.execute(params![
                        search_id,
                        record.node_id.as_str(),
                        record.depth,
                        position as u32,
                        Some(edge.as_str())
                    ])?;
                }
            }

            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO videos (video_id, search_id, title, postdate, description,
                 category, channel_id, likes, dislikes, views, n_comments)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for video in &output.videos {
                insert_video(&mut stmt, search_id, video)?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO channels (channel_id, name, country, date_created,
                 n_subscribers, n_videos, n_views, categories)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for channel in &output.channels {
                insert_channel(&mut stmt, channel)?;
            }
        }

        tx.commit()?;
        Ok(search_id)
    }

    fn search_exists(&self, query: &str, root: &NodeId) -> StorageResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM searches WHERE query = ?1 AND root_video = ?2)",
            params![query, root.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_search(&self, search_id: i64) -> StorageResult<SearchRun> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM searches WHERE search_id = ?1", SEARCH_COLUMNS),
                params![search_id],
                SearchRow::from_row,
            )
            .optional()?
            .ok_or(StorageError::SearchNotFound(search_id))?;

        row.into_run()
    }

    fn list_searches(&self) -> StorageResult<Vec<SearchRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM searches ORDER BY search_id",
            SEARCH_COLUMNS
        ))?;

        let rows = stmt.query_map([], SearchRow::from_row)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?.into_run()?);
        }
        Ok(runs)
    }

    // ===== Search Records =====

    fn load_search_tree(&self, search_id: i64) -> StorageResult<SearchTree> {
        let run = self.get_search(search_id)?;
        let records = self.load_records(search_id)?;
        Ok(SearchTree::new(run.root, run.params, records))
    }

    fn load_all_search_trees(&self) -> StorageResult<Vec<(SearchRun, SearchTree)>> {
        let runs = self.list_searches()?;
        let mut trees = Vec::with_capacity(runs.len());
        for run in runs {
            let records = self.load_records(run.search_id)?;
            let tree = SearchTree::new(run.root.clone(), run.params, records);
            trees.push((run, tree));
        }
        Ok(trees)
    }

    // ===== Metadata =====

    fn filter_unknown_videos(&self, video_ids: &[NodeId]) -> StorageResult<Vec<NodeId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT EXISTS(SELECT 1 FROM videos WHERE video_id = ?1)")?;

        let mut unknown = Vec::new();
        for video_id in distinct(video_ids) {
            let known: bool = stmt.query_row(params![video_id.as_str()], |row| row.get(0))?;
            if !known {
                unknown.push(video_id);
            }
        }
        Ok(unknown)
    }

    fn filter_unknown_channels(&self, channel_ids: &[String]) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT EXISTS(SELECT 1 FROM channels WHERE channel_id = ?1)")?;

        let mut unknown = Vec::new();
        for channel_id in distinct(channel_ids) {
            let known: bool = stmt.query_row(params![channel_id], |row| row.get(0))?;
            if !known {
                unknown.push(channel_id);
            }
        }
        Ok(unknown)
    }

    fn get_video(&self, video_id: &NodeId) -> StorageResult<Option<VideoMetadata>> {
        let video = self
            .conn
            .query_row(
                "SELECT title, postdate, description, category, channel_id,
                 likes, dislikes, views, n_comments
                 FROM videos WHERE video_id = ?1",
                params![video_id.as_str()],
                |row| {
                    Ok(VideoMetadata {
                        video_id: video_id.clone(),
                        title: row.get(0)?,
                        postdate: row.get(1)?,
                        description: row.get(2)?,
                        category: row.get(3)?,
                        channel_id: row.get(4)?,
                        likes: count_from_db(row.get(5)?),
                        dislikes: count_from_db(row.get(6)?),
                        views: count_from_db(row.get(7)?),
                        n_comments: count_from_db(row.get(8)?),
                    })
                },
            )
            .optional()?;

        Ok(video)
    }

    fn get_channel(&self, channel_id: &str) -> StorageResult<Option<ChannelMetadata>> {
        let channel = self
            .conn
            .query_row(
                "SELECT name, country, date_created, n_subscribers, n_videos, n_views, categories
                 FROM channels WHERE channel_id = ?1",
                params![channel_id],
                |row| {
                    let categories: Option<String> = row.get(6)?;
                    Ok(ChannelMetadata {
                        channel_id: channel_id.to_string(),
                        name: row.get(0)?,
                        country: row.get(1)?,
                        date_created: row.get(2)?,
                        n_subscribers: count_from_db(row.get(3)?),
                        n_videos: count_from_db(row.get(4)?),
                        n_views: count_from_db(row.get(5)?),
                        categories: categories
                            .map(|c| {
                                c.split(',')
                                    .filter(|s| !s.is_empty())
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                },
            )
            .optional()?;

        Ok(channel)
    }

    // ===== Completed Trees =====

    fn save_completed_tree(
        &mut self,
        search_id: i64,
        rows: &[CompletedRow],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM recommendations_full WHERE search_id = ?1",
            params![search_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO recommendations_full (search_id, vertex_id, video_id, depth, recommendation)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![
                    search_id,
                    row.vertex_id.get() as i64,
                    row.node_id.as_str(),
                    row.depth,
                    row.recommendation.as_ref().map(|r| r.as_str()),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_completed_tree(&self, search_id: i64) -> StorageResult<Vec<CompletedRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT vertex_id, video_id, depth, recommendation FROM recommendations_full
             WHERE search_id = ?1 ORDER BY depth, video_id, id",
        )?;

        let rows = stmt.query_map(params![search_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut completed = Vec::new();
        for row in rows {
            let (vertex_id, video_id, depth, recommendation) = row?;
            completed.push(CompletedRow {
                search_id,
                vertex_id: VertexId::new(vertex_id as u64),
                node_id: parse_node_id(&video_id)?,
                depth,
                recommendation: recommendation.as_deref().map(parse_node_id).transpose()?,
            });
        }
        Ok(completed)
    }

    // ===== Statistics =====

    fn count_searches(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM searches")
    }

    fn count_expanded_nodes(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM (SELECT DISTINCT search_id, video_id FROM recommendations)")
    }

    fn count_edges(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM recommendations WHERE recommendation IS NOT NULL")
    }

    fn count_videos(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM videos")
    }

    fn count_channels(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM channels")
    }

    fn count_completed_searches(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(DISTINCT search_id) FROM recommendations_full")
    }

    fn count_completed_rows(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM recommendations_full")
    }

    fn get_depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM
             (SELECT DISTINCT search_id, video_id, depth FROM recommendations)
             GROUP BY depth ORDER BY depth",
        )?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }
}
