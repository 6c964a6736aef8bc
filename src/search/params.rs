use crate::config::CrawlerConfig;

/// Parameters of one crawl
///
/// Immutable for the lifetime of a crawl and persisted alongside its output,
/// since completion replays the same sampling policy later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlParams {
    /// Target number of out-edges kept per expanded node (n)
    pub branching_factor: u32,

    /// Depth of the leaves (d)
    pub max_depth: u32,

    /// Depth at which sampling starts thinning out-edges (c)
    pub sample_threshold_depth: u32,

    /// Whether sampling applies at all
    pub sampling_enabled: bool,
}

impl CrawlParams {
    /// Upper bound on the number of expanded (non-leaf) nodes of one crawl
    ///
    /// This is the vertex count of an n-regular tree with `max_depth` levels
    /// above the leaves, and is what quota estimates are based on.
    pub fn max_expanded_nodes(&self) -> u64 {
        let n = u64::from(self.branching_factor);
        (0..self.max_depth).fold(0u64, |acc, level| {
            acc.saturating_add(n.saturating_pow(level))
        })
    }
}

impl From<&CrawlerConfig> for CrawlParams {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            branching_factor: config.branching_factor,
            max_depth: config.max_depth,
            sample_threshold_depth: config.sample_threshold_depth,
            sampling_enabled: config.sampling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(branching_factor: u32, max_depth: u32) -> CrawlParams {
        CrawlParams {
            branching_factor,
            max_depth,
            sample_threshold_depth: max_depth,
            sampling_enabled: false,
        }
    }

    #[test]
    fn test_max_expanded_nodes() {
        // 1 + 3 + 9
        assert_eq!(params(3, 3).max_expanded_nodes(), 13);
        // 1 + 2
        assert_eq!(params(2, 2).max_expanded_nodes(), 3);
        assert_eq!(params(1, 5).max_expanded_nodes(), 5);
    }

    #[test]
    fn test_max_expanded_nodes_saturates() {
        assert_eq!(params(1000, 40).max_expanded_nodes(), u64::MAX);
    }
}
