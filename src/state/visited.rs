//! Per-tree visited set
//!
//! Each crawl owns one `VisitedSet`. A node is marked when it is enqueued,
//! not when it is fetched, so two parents at the same depth recommending the
//! same video never both schedule it. The same video may still appear in
//! other trees.

use crate::node::NodeId;
use std::collections::HashSet;

/// Nodes already claimed by one tree
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    seen: HashSet<NodeId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `node_id` as visited
    ///
    /// # Returns
    ///
    /// `true` if the node was not visited before this call
    pub fn mark_and_check(&mut self, node_id: &NodeId) -> bool {
        if self.seen.contains(node_id) {
            return false;
        }
        self.seen.insert(node_id.clone())
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.seen.contains(node_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn test_first_mark_wins() {
        let mut visited = VisitedSet::new();
        assert!(visited.is_empty());

        assert!(visited.mark_and_check(&id("A")));
        assert!(!visited.mark_and_check(&id("A")));
        assert!(visited.mark_and_check(&id("B")));

        assert_eq!(visited.len(), 2);
        assert!(visited.contains(&id("A")));
        assert!(!visited.contains(&id("C")));
    }
}
