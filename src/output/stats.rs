//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::Storage;
use crate::FollowerError;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Number of stored searches
    pub searches: u64,

    /// Expanded nodes across all searches, leaves included
    pub expanded_nodes: u64,

    /// Recorded out-edges across all searches
    pub edges: u64,

    /// Videos with stored metadata
    pub videos: u64,

    /// Channels with stored metadata
    pub channels: u64,

    /// Searches with a completed tree
    pub completed_searches: u64,

    /// Rows across all completed trees
    pub completed_rows: u64,

    /// Expanded nodes per depth
    pub depth_breakdown: BTreeMap<u32, u64>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(FollowerError)` - Failed to query statistics
pub fn load_statistics<S: Storage + ?Sized>(storage: &S) -> Result<CrawlStatistics, FollowerError> {
    Ok(CrawlStatistics {
        searches: storage.count_searches()?,
        expanded_nodes: storage.count_expanded_nodes()?,
        edges: storage.count_edges()?,
        videos: storage.count_videos()?,
        channels: storage.count_channels()?,
        completed_searches: storage.count_completed_searches()?,
        completed_rows: storage.count_completed_rows()?,
        depth_breakdown: storage.get_depth_breakdown()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Searches: {}", stats.searches);
    println!("  Expanded nodes: {}", stats.expanded_nodes);
    println!("  Recommendation edges: {}", stats.edges);
    println!("  Videos with metadata: {}", stats.videos);
    println!("  Channels with metadata: {}", stats.channels);
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Nodes by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            let percentage = if stats.expanded_nodes > 0 {
                (*count as f64 / stats.expanded_nodes as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", depth, count, percentage);
        }
        println!();
    }

    println!("Completion:");
    println!(
        "  Completed searches: {} / {}",
        stats.completed_searches, stats.searches
    );
    println!("  Completed tree rows: {}", stats.completed_rows);

    if stats.expanded_nodes > 0 {
        println!(
            "\nMean out-degree: {:.2}",
            stats.edges as f64 / stats.expanded_nodes as f64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{CrawlParams, SearchRecord, SearchTree};
    use crate::storage::{CrawlOutput, SqliteStorage};
    use crate::NodeId;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn test_empty_database_statistics() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats, CrawlStatistics::default());
    }

    #[test]
    fn test_statistics_count_saved_crawl() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let params = CrawlParams {
            branching_factor: 2,
            max_depth: 1,
            sample_threshold_depth: 1,
            sampling_enabled: false,
        };
        let tree = SearchTree::new(
            id("A"),
            params,
            vec![
                SearchRecord {
                    node_id: id("A"),
                    depth: 0,
                    out_edges: vec![id("B"), id("C")],
                },
                SearchRecord::leaf(id("B"), 1),
                SearchRecord::leaf(id("C"), 1),
            ],
        );
        storage
            .save_crawl(&CrawlOutput {
                query: "news".to_string(),
                tree,
                config_hash: "hash".to_string(),
                videos: vec![],
                channels: vec![],
            })
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.searches, 1);
        assert_eq!(stats.expanded_nodes, 3);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.depth_breakdown.get(&0), Some(&1));
        assert_eq!(stats.depth_breakdown.get(&1), Some(&2));
        assert_eq!(stats.completed_searches, 0);
    }
}
