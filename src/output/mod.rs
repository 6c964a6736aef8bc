//! Output module for reporting on stored crawls
//!
//! This module handles:
//! - Loading aggregate statistics from storage
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
