//! Level-synchronous frontier for one tree crawl
//!
//! This module handles:
//! - The current-depth and next-depth FIFO queues
//! - Promoting the next queue once the current one drains
//! - Dropping children that the tree has already claimed
//!
//! Every node at depth `k` is dequeued before any node at depth `k + 1`.

use crate::node::NodeId;
use crate::state::{CrawlPhase, VisitedSet};
use std::collections::VecDeque;

/// A node waiting to be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNode {
    /// The node to expand
    pub node_id: NodeId,

    /// BFS level at which the node was enqueued
    pub depth: u32,
}

/// Frontier of a single tree crawl
///
/// The frontier owns the tree's `VisitedSet`, so a node can only ever be
/// enqueued once per tree.
#[derive(Debug)]
pub struct LevelFrontier {
    /// Nodes at the depth being processed
    current: VecDeque<QueuedNode>,

    /// Nodes discovered for the following depth
    next: VecDeque<QueuedNode>,

    /// Nodes claimed by this tree
    visited: VisitedSet,

    /// Where the walk currently is
    phase: CrawlPhase,
}

impl LevelFrontier {
    /// Creates a frontier holding only the root at depth 0
    ///
    /// The root is marked visited immediately.
    pub fn new(root: NodeId) -> Self {
        let mut visited = VisitedSet::new();
        visited.mark_and_check(&root);

        let mut current = VecDeque::new();
        current.push_back(QueuedNode {
            node_id: root,
            depth: 0,
        });

        Self {
            current,
            next: VecDeque::new(),
            visited,
            phase: CrawlPhase::start(),
        }
    }

    /// Gets the next node to expand
    ///
    /// When the current queue is empty, the next queue is promoted and the
    /// phase advances one level.
    ///
    /// # Returns
    ///
    /// * `Some(QueuedNode)` - The next node, in BFS order
    /// * `None` - Both queues are empty; the phase is now `Done`
    pub fn next_node(&mut self) -> Option<QueuedNode> {
        loop {
            if let Some(node) = self.current.pop_front() {
                return Some(node);
            }

            let depth = self.phase.depth()?;
            let next_depth = depth.saturating_add(1);
            self.phase = self
                .phase
                .on_level_drained()
                .on_advance(next_depth, self.next.is_empty());

            if self.phase.is_done() {
                return None;
            }

            tracing::debug!(
                "Advancing to depth {} with {} queued nodes",
                next_depth,
                self.next.len()
            );
            std::mem::swap(&mut self.current, &mut self.next);
        }
    }

    /// Enqueues the children of a node expanded at `parent_depth`
    ///
    /// Children already claimed by this tree (expanded, or pending in either
    /// queue) are silently dropped.
    ///
    /// # Returns
    ///
    /// The number of children actually enqueued
    pub fn enqueue_children(&mut self, children: &[NodeId], parent_depth: u32) -> usize {
        let depth = parent_depth.saturating_add(1);
        let mut added = 0;

        for child in children {
            if self.visited.mark_and_check(child) {
                self.next.push_back(QueuedNode {
                    node_id: child.clone(),
                    depth,
                });
                added += 1;
            }
        }

        added
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// Number of nodes waiting in both queues
    pub fn pending(&self) -> usize {
        self.current.len() + self.next.len()
    }
}
