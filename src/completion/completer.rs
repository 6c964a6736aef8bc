//! Reconstruction of truncated crawl trees
//!
//! A crawl expands each node id once per tree, so a video recommended by two
//! parents only gets children under one of them, and anything the sampler
//! dropped is never expanded at all. Completion walks the tree level by level
//! and, for every recommendation that has no expansion at the next level,
//! splices in the out-edges some other crawl recorded for that video.

use crate::completion::corpus::EdgeCorpus;
use crate::completion::vertex::{VertexAllocator, VertexId};
use crate::node::NodeId;
use crate::policy::SamplingPolicy;
use crate::search::{SearchRecord, SearchTree};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

/// One edge (or childless vertex) of a completed tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRow {
    pub search_id: i64,
    pub vertex_id: VertexId,
    pub node_id: NodeId,
    pub depth: u32,
    /// `None` for a vertex without children
    pub recommendation: Option<NodeId>,
}

/// Multiset difference `first - second`, preserving the order of `first`
///
/// Each element of `second` cancels at most one equal element of `first`.
///
/// # Examples
///
/// ```
/// use rec_follower::completion::list_difference;
///
/// assert_eq!(list_difference(&[1, 2, 2, 3, 3, 4], &[2, 2, 3]), vec![1, 3, 4]);
/// ```
pub fn list_difference<T: PartialEq + Clone>(first: &[T], second: &[T]) -> Vec<T> {
    let mut remaining: Vec<&T> = second.iter().collect();
    let mut result = Vec::with_capacity(first.len());

    for item in first {
        match remaining.iter().position(|r| *r == item) {
            Some(ix) => {
                remaining.swap_remove(ix);
            }
            None => result.push(item.clone()),
        }
    }

    result
}

/// Completes truncated trees against an edge corpus
#[derive(Debug, Clone, Copy)]
pub struct TreeCompleter<'a> {
    corpus: &'a EdgeCorpus,
}

impl<'a> TreeCompleter<'a> {
    pub fn new(corpus: &'a EdgeCorpus) -> Self {
        Self { corpus }
    }

    /// Completes one crawl up to `target_depth`
    ///
    /// # Arguments
    ///
    /// * `search_id` - Tag written on every output row
    /// * `tree` - The truncated crawl, with the parameters it ran under
    /// * `target_depth` - Deepest level to reconstruct (usually the crawl's `max_depth`)
    /// * `rng` - Randomness for re-sampling spliced edges
    ///
    /// # Returns
    ///
    /// Rows sorted by `(depth, node_id)`. The crawl's own rows come first
    /// within equal keys, in recorded order. When `target_depth` is below the
    /// crawl's own depth, deeper records are cut and nodes at `target_depth`
    /// lose their out-edges.
    pub fn complete<R>(
        &self,
        search_id: i64,
        tree: &SearchTree,
        target_depth: u32,
        rng: &mut R,
    ) -> Vec<CompletedRow>
    where
        R: Rng + ?Sized,
    {
        let params = tree.params();
        let sampling = SamplingPolicy::from_params(params);
        let mut rows = initial_rows(search_id, tree, target_depth);
        let mut vertices = VertexAllocator::after(rows.iter().map(|r| r.vertex_id).max());
        let initial_vertices = vertices.peek();

        let mut previous_recommendations: Vec<NodeId> = Vec::new();
        for depth in 0..=target_depth {
            let parent_ids: Vec<NodeId> = {
                let mut seen = HashSet::new();
                rows.iter()
                    .filter(|r| r.depth == depth)
                    .filter(|r| seen.insert(&r.node_id))
                    .map(|r| r.node_id.clone())
                    .collect()
            };

            let truncated = list_difference(&previous_recommendations, &parent_ids);
            let mut dead_ends = 0usize;

            for node_id in truncated {
                let vertex_id = vertices.allocate();
                let childless = CompletedRow {
                    search_id,
                    vertex_id,
                    node_id: node_id.clone(),
                    depth,
                    recommendation: None,
                };

                if depth >= target_depth {
                    rows.push(childless);
                    continue;
                }

                let Some(entry) = self.corpus.lookup(&node_id) else {
                    dead_ends += 1;
                    rows.push(childless);
                    continue;
                };

                let source_was_sampled = sampling.applies_at(entry.source_depth);
                let kept = sampling.apply(&entry.out_edges, depth, source_was_sampled, rng);

                if kept.is_empty() {
                    rows.push(childless);
                    continue;
                }

                rows.extend(kept.into_iter().map(|recommendation| CompletedRow {
                    search_id,
                    vertex_id,
                    node_id: node_id.clone(),
                    depth,
                    recommendation: Some(recommendation),
                }));
            }

            if dead_ends > 0 {
                tracing::warn!(
                    "Search {}: {} truncated nodes at depth {} are not in the corpus",
                    search_id,
                    dead_ends,
                    depth
                );
            }

            previous_recommendations = rows
                .iter()
                .filter(|r| r.depth == depth)
                .filter_map(|r| r.recommendation.clone())
                .collect();
        }

        tracing::debug!(
            "Search {}: completed to depth {} with {} new vertices",
            search_id,
            target_depth,
            vertices.peek().get() - initial_vertices.get()
        );

        rows.sort_by(|a, b| (a.depth, &a.node_id).cmp(&(b.depth, &b.node_id)));
        rows
    }
}

/// Rows of the crawl itself down to `target_depth`, one vertex per distinct
/// `(depth, node_id)`
///
/// Vertex ids are assigned in `(depth, node_id)` order starting at 0.
fn initial_rows(search_id: i64, tree: &SearchTree, target_depth: u32) -> Vec<CompletedRow> {
    let kept: Vec<&SearchRecord> = tree
        .records()
        .iter()
        .filter(|r| r.depth <= target_depth)
        .collect();

    let mut vertex_of: BTreeMap<(u32, &NodeId), VertexId> = kept
        .iter()
        .map(|r| ((r.depth, &r.node_id), VertexId::new(0)))
        .collect();
    for (ix, vertex) in vertex_of.values_mut().enumerate() {
        *vertex = VertexId::new(ix as u64);
    }

    let mut rows = Vec::new();
    for record in kept {
        let vertex_id = vertex_of[&(record.depth, &record.node_id)];
        let template = CompletedRow {
            search_id,
            vertex_id,
            node_id: record.node_id.clone(),
            depth: record.depth,
            recommendation: None,
        };

        if record.out_edges.is_empty() || record.depth == target_depth {
            rows.push(template);
        } else {
            rows.extend(record.out_edges.iter().map(|edge| CompletedRow {
                recommendation: Some(edge.clone()),
                ..template.clone()
            }));
        }
    }
    rows
}
