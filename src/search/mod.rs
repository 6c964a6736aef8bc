//! Search data model
//!
//! A "search" is one crawl rooted at a single video. It is described by its
//! immutable [`CrawlParams`] and produces one [`SearchRecord`] per expanded
//! node, collected in a [`SearchTree`].

mod params;
mod record;

pub use params::CrawlParams;
pub use record::{SearchRecord, SearchTree};
