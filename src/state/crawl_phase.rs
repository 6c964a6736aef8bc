/// Phases of a single level-synchronous tree crawl
///
/// A crawl drains every node of the current depth before any node of the
/// next depth is fetched:
///
/// ```text
/// LevelActive(0) -> LevelAdvance -> LevelActive(1) -> ... -> Done
/// ```
use std::fmt;

/// Represents where a tree crawl currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nodes at this depth are being popped from the current queue
    LevelActive(u32),

    /// The current queue drained; the next queue is about to be promoted
    LevelAdvance,

    /// No nodes left at any depth
    Done,
}

impl CrawlPhase {
    /// Phase of a freshly started crawl
    pub fn start() -> Self {
        Self::LevelActive(0)
    }

    /// Returns true once the crawl has no work left
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The depth being processed, if a level is active
    pub fn depth(&self) -> Option<u32> {
        match self {
            Self::LevelActive(depth) => Some(*depth),
            _ => None,
        }
    }

    /// Transition taken when the current queue drains
    pub fn on_level_drained(self) -> Self {
        match self {
            Self::LevelActive(_) => Self::LevelAdvance,
            other => other,
        }
    }

    /// Transition taken when advancing, given whether the next queue has nodes
    ///
    /// `next_depth` is the depth of the promoted queue.
    pub fn on_advance(self, next_depth: u32, next_queue_empty: bool) -> Self {
        match self {
            Self::LevelAdvance if next_queue_empty => Self::Done,
            Self::LevelAdvance => Self::LevelActive(next_depth),
            other => other,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelActive(depth) => write!(f, "level {} active", depth),
            Self::LevelAdvance => write!(f, "advancing level"),
            Self::Done => write!(f, "done"),
        }
    }
}
