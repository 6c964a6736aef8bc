//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Where a single tree crawl is in its level-by-level walk
//! - `VisitedSet`: Nodes already claimed by the current tree

mod crawl_phase;
mod visited;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use visited::VisitedSet;
