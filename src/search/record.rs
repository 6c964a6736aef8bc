use crate::node::NodeId;
use crate::search::CrawlParams;
use std::collections::{BTreeMap, HashMap};

/// Out-edges of one node, as expanded in one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRecord {
    /// The expanded node
    pub node_id: NodeId,

    /// BFS level at which the node was first dequeued
    pub depth: u32,

    /// Retained recommendations, in page order; empty for leaves
    pub out_edges: Vec<NodeId>,
}

impl SearchRecord {
    /// Creates a leaf record (no out-edges)
    pub fn leaf(node_id: NodeId, depth: u32) -> Self {
        Self {
            node_id,
            depth,
            out_edges: Vec::new(),
        }
    }
}

/// Immutable result of one crawl
///
/// Records are kept in expansion order, which is level order: every record at
/// depth `k` precedes every record at depth `k + 1`. Each node id appears at
/// most once.
#[derive(Debug, Clone)]
pub struct SearchTree {
    root: NodeId,
    params: CrawlParams,
    records: Vec<SearchRecord>,
    index: HashMap<NodeId, usize>,
}

impl SearchTree {
    /// Assembles a tree from records in expansion order
    ///
    /// If a node id occurs more than once, the first record wins.
    pub fn new(root: NodeId, params: CrawlParams, records: Vec<SearchRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if index.contains_key(&record.node_id) {
                tracing::debug!("Dropping repeated record for {}", record.node_id);
                continue;
            }
            index.insert(record.node_id.clone(), kept.len());
            kept.push(record);
        }

        Self {
            root,
            params,
            records: kept,
            index,
        }
    }

    /// The root node of the crawl
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// The parameters the crawl ran with
    pub fn params(&self) -> &CrawlParams {
        &self.params
    }

    /// All records in expansion order
    pub fn records(&self) -> &[SearchRecord] {
        &self.records
    }

    /// Looks up the record of a node
    pub fn get(&self, node_id: &NodeId) -> Option<&SearchRecord> {
        self.index.get(node_id).map(|&ix| &self.records[ix])
    }

    /// Number of expanded nodes (leaves included)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no node was expanded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of recorded out-edges
    pub fn edge_count(&self) -> usize {
        self.records.iter().map(|r| r.out_edges.len()).sum()
    }

    /// Records grouped by depth
    pub fn by_depth(&self) -> BTreeMap<u32, Vec<&SearchRecord>> {
        let mut levels: BTreeMap<u32, Vec<&SearchRecord>> = BTreeMap::new();
        for record in &self.records {
            levels.entry(record.depth).or_default().push(record);
        }
        levels
    }

    /// Every node id mentioned by the tree, expanded or only recommended
    pub fn mentioned_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .records
            .iter()
            .flat_map(|r| std::iter::once(&r.node_id).chain(r.out_edges.iter()))
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
