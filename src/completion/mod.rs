//! Offline completion of truncated crawl trees
//!
//! This module handles:
//! - Building the cross-crawl `EdgeCorpus` from every stored search
//! - Reconstructing each search to a target depth with `TreeCompleter`
//! - Replacing the stored completed tree of each search

mod completer;
mod corpus;
mod vertex;

pub use completer::{list_difference, CompletedRow, TreeCompleter};
pub use corpus::{CorpusEntry, EdgeCorpus};
pub use vertex::{VertexAllocator, VertexId};

use crate::storage::{Storage, StorageError};
use crate::FollowerError;
use rand::Rng;

/// Summary of one completion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReport {
    /// Searches whose completed tree was written
    pub searches: usize,

    /// Rows written across all completed trees
    pub rows: usize,

    /// Entries in the corpus the trees were completed against
    pub corpus_entries: usize,
}

/// Completes stored searches and saves their completed trees
///
/// The corpus is built from every stored search, even when only one search
/// is completed.
///
/// # Arguments
///
/// * `storage` - Where searches are read from and completed trees written to
/// * `only` - Complete just this search instead of all of them
/// * `target_depth` - Depth to complete to; defaults to each search's own `max_depth`
/// * `rng` - Randomness for re-sampling spliced edges
///
/// # Returns
///
/// * `Ok(CompletionReport)` - Every selected search was completed
/// * `Err(FollowerError::Storage)` - Reading or writing failed, or `only` names no search
pub fn complete_searches<S, R>(
    storage: &mut S,
    only: Option<i64>,
    target_depth: Option<u32>,
    rng: &mut R,
) -> Result<CompletionReport, FollowerError>
where
    S: Storage,
    R: Rng + ?Sized,
{
    let trees = storage.load_all_search_trees()?;
    let corpus = EdgeCorpus::from_trees(trees.iter().map(|(_, tree)| tree));
    let completer = TreeCompleter::new(&corpus);

    if let Some(search_id) = only {
        if !trees.iter().any(|(run, _)| run.search_id == search_id) {
            return Err(StorageError::SearchNotFound(search_id).into());
        }
    }

    let mut report = CompletionReport {
        corpus_entries: corpus.len(),
        ..CompletionReport::default()
    };

    for (run, tree) in trees
        .iter()
        .filter(|(run, _)| only.map_or(true, |id| id == run.search_id))
    {
        let depth = target_depth.unwrap_or(run.params.max_depth);
        let rows = completer.complete(run.search_id, tree, depth, rng);
        storage.save_completed_tree(run.search_id, &rows)?;

        tracing::info!(
            "Completed search {} ({} from {}) to depth {}: {} rows",
            run.search_id,
            run.query,
            run.root,
            depth,
            rows.len()
        );
        report.searches += 1;
        report.rows += rows.len();
    }

    Ok(report)
}
