//! Cross-crawl index of observed out-edges
//!
//! Every crawl records the out-edges of the nodes it expanded. The corpus
//! keeps one source record per node id across all crawls, chosen
//! deterministically whatever order the crawls are folded in:
//!
//! 1. Smallest `source_depth` (the least sampled observation)
//! 2. On equal depth, the most out-edges
//! 3. On equal length, the lexicographically smallest edge list

use crate::node::NodeId;
use crate::search::{SearchRecord, SearchTree};
use std::collections::HashMap;

/// Out-edges of a node as recorded by some crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    /// Depth at which the node was expanded in that crawl
    pub source_depth: u32,

    /// The recorded out-edges
    pub out_edges: Vec<NodeId>,
}

impl CorpusEntry {
    fn preferred_over(&self, other: &CorpusEntry) -> bool {
        self.source_depth
            .cmp(&other.source_depth)
            .then_with(|| other.out_edges.len().cmp(&self.out_edges.len()))
            .then_with(|| self.out_edges.cmp(&other.out_edges))
            .is_lt()
    }
}

/// Index from node id to its chosen source record
#[derive(Debug, Clone, Default)]
pub struct EdgeCorpus {
    entries: HashMap<NodeId, CorpusEntry>,
}

impl EdgeCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds raw search records into a corpus
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = SearchRecord>,
    {
        let mut corpus = Self::new();
        for record in records {
            corpus.insert(record.node_id, record.depth, record.out_edges);
        }
        corpus
    }

    /// Folds whole crawls into a corpus
    ///
    /// Leaves (records at their crawl's `max_depth`) were never fetched, so
    /// their empty out-edges say nothing about the node and are skipped.
    pub fn from_trees<'a, I>(trees: I) -> Self
    where
        I: IntoIterator<Item = &'a SearchTree>,
    {
        let mut corpus = Self::new();
        for tree in trees {
            let max_depth = tree.params().max_depth;
            for record in tree.records().iter().filter(|r| r.depth < max_depth) {
                corpus.insert(
                    record.node_id.clone(),
                    record.depth,
                    record.out_edges.clone(),
                );
            }
        }
        tracing::debug!("Built edge corpus with {} entries", corpus.len());
        corpus
    }

    /// Adds one observation, keeping whichever source record is preferred
    pub fn insert(&mut self, node_id: NodeId, source_depth: u32, out_edges: Vec<NodeId>) {
        let candidate = CorpusEntry {
            source_depth,
            out_edges,
        };

        match self.entries.get_mut(&node_id) {
            Some(current) => {
                if candidate.preferred_over(current) {
                    *current = candidate;
                }
            }
            None => {
                self.entries.insert(node_id, candidate);
            }
        }
    }

    /// The source record of `node_id`, if any crawl expanded it
    pub fn lookup(&self, node_id: &NodeId) -> Option<&CorpusEntry> {
        self.entries.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
