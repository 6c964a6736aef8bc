//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl; parameters are replayed by completion
CREATE TABLE IF NOT EXISTS searches (
    search_id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    root_video TEXT NOT NULL,
    n_splits INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    const_depth INTEGER NOT NULL,
    sample INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    config_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_searches_query_root ON searches(query, root_video);

-- One row per out-edge, or one NULL row for a node without out-edges
CREATE TABLE IF NOT EXISTS recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL REFERENCES searches(search_id),
    video_id TEXT NOT NULL,
    depth INTEGER NOT NULL,
    position INTEGER NOT NULL,
    recommendation TEXT
);

CREATE INDEX IF NOT EXISTS idx_recommendations_search ON recommendations(search_id);
CREATE INDEX IF NOT EXISTS idx_recommendations_video ON recommendations(video_id);

-- Video metadata; the first observation wins
CREATE TABLE IF NOT EXISTS videos (
    video_id TEXT PRIMARY KEY,
    search_id INTEGER REFERENCES searches(search_id),
    title TEXT,
    postdate TEXT,
    description TEXT,
    category TEXT,
    channel_id TEXT,
    likes INTEGER,
    dislikes INTEGER,
    views INTEGER,
    n_comments INTEGER
);

CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);

-- Channel metadata; the first observation wins
CREATE TABLE IF NOT EXISTS channels (
    channel_id TEXT PRIMARY KEY,
    name TEXT,
    country TEXT,
    date_created TEXT,
    n_subscribers INTEGER,
    n_videos INTEGER,
    n_views INTEGER,
    categories TEXT
);

-- Completed trees, replaced per search on recompletion
CREATE TABLE IF NOT EXISTS recommendations_full (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL REFERENCES searches(search_id),
    vertex_id INTEGER NOT NULL,
    video_id TEXT NOT NULL,
    depth INTEGER NOT NULL,
    recommendation TEXT
);

CREATE INDEX IF NOT EXISTS idx_recommendations_full_search ON recommendations_full(search_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "searches",
            "recommendations",
            "videos",
            "channels",
            "recommendations_full",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
