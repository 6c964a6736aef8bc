//! Probabilistic down-sampling of deep out-edges
//!
//! Once a crawl reaches `sample_threshold_depth`, the branching factor
//! would make the tree explode. Each out-edge of a node at or below the
//! threshold is then kept independently with probability `1 / n`, where `n`
//! is the number of out-edges, so the expected number kept is 1 and the
//! tree grows roughly linearly past the threshold.
//!
//! Sampling is applied once per node. Edges spliced from a corpus entry
//! that was itself recorded past the threshold are already sampled and are
//! passed through unchanged.

use crate::search::CrawlParams;
use rand::Rng;

/// Decides which out-edges are kept at a given depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    enabled: bool,
    threshold_depth: u32,
}

impl SamplingPolicy {
    pub fn new(enabled: bool, threshold_depth: u32) -> Self {
        Self {
            enabled,
            threshold_depth,
        }
    }

    /// A policy that never drops edges
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn from_params(params: &CrawlParams) -> Self {
        Self::new(params.sampling_enabled, params.sample_threshold_depth)
    }

    /// Whether nodes at `depth` have their out-edges sampled
    pub fn applies_at(&self, depth: u32) -> bool {
        self.enabled && depth >= self.threshold_depth
    }

    /// Applies the policy to the out-edges of a node at `depth`
    ///
    /// # Arguments
    ///
    /// * `out_edges` - Candidate out-edges, in page order
    /// * `depth` - Depth of the node owning the edges
    /// * `source_was_sampled` - The edges were already sampled when recorded
    /// * `rng` - Randomness source
    ///
    /// # Returns
    ///
    /// The kept edges, in their original relative order. The input is
    /// returned unchanged when sampling is disabled, when `depth` is less
    /// than the threshold depth, or when `source_was_sampled` is set.
    pub fn apply<T, R>(
        &self,
        out_edges: &[T],
        depth: u32,
        source_was_sampled: bool,
        rng: &mut R,
    ) -> Vec<T>
    where
        T: Clone,
        R: Rng + ?Sized,
    {
        if !self.applies_at(depth) || source_was_sampled || out_edges.is_empty() {
            return out_edges.to_vec();
        }

        let keep_probability = 1.0 / out_edges.len() as f64;
        out_edges
            .iter()
            .filter(|_| rng.random_bool(keep_probability))
            .cloned()
            .collect()
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
