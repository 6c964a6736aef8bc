//! Node identifiers for the recommendation graph
//!
//! A node id is the opaque identifier of one video. The crawler never creates
//! ids itself; they come from configuration (roots) or from recommendation
//! links scraped off watch pages.

mod watch;

pub use watch::{from_watch_href, watch_url};

use crate::NodeIdError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Opaque, validated identifier of a video
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id, rejecting empty ids and ids containing whitespace
    ///
    /// # Examples
    ///
    /// ```
    /// use rec_follower::node::NodeId;
    ///
    /// let id = NodeId::new("dQw4w9WgXcQ").unwrap();
    /// assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    /// assert!(NodeId::new("  ").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, NodeIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(NodeIdError::Empty);
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(NodeIdError::InvalidCharacter(id));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(NodeId::new("A").is_ok());
        assert!(NodeId::new("dQw4w9WgXcQ").is_ok());
        assert!(NodeId::new("a-b_c").is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        assert_eq!(NodeId::new(""), Err(NodeIdError::Empty));
    }

    #[test]
    fn test_whitespace_rejected() {
        assert!(matches!(
            NodeId::new("abc def"),
            Err(NodeIdError::InvalidCharacter(_))
        ));
        assert!(NodeId::new("abc\n").is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![
            NodeId::new("C").unwrap(),
            NodeId::new("A").unwrap(),
            NodeId::new("B").unwrap(),
        ];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
