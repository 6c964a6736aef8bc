//! Metadata quota accounting
//!
//! Each crawl is followed by metadata lookups that are charged against a
//! daily quota. Before a crawl starts, the worst-case cost of its lookups is
//! reserved:
//!
//! ```text
//! max_videos = sum(n^i for i in 0..d)
//! queries    = round(max_videos / video_batch_size)
//! cost       = queries * cost_per_batch
//! ```
//!
//! Halves round to even, so 1.5 queries become 2 and 2.5 become 2.
//!
//! Once a reservation fails, or the metadata service itself reports the quota
//! as exceeded, the budget stays exhausted for the rest of the run.

use crate::config::MetadataConfig;
use crate::search::CrawlParams;
use std::sync::Mutex;

/// Estimated metadata cost of one crawl
pub fn estimate_crawl_cost(params: &CrawlParams, config: &MetadataConfig) -> u64 {
    let max_videos = params.max_expanded_nodes();
    let batch = config.video_batch_size.max(1) as f64;
    let queries = (max_videos as f64 / batch).round_ties_even() as u64;
    queries.saturating_mul(config.cost_per_batch)
}

#[derive(Debug, Default)]
struct BudgetState {
    used: u64,
    exhausted: bool,
}

/// Quota shared by every crawl of one run
#[derive(Debug)]
pub struct QuotaBudget {
    limit: u64,
    state: Mutex<BudgetState>,
}

impl QuotaBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            state: Mutex::new(BudgetState::default()),
        }
    }

    /// Reserves `cost` units
    ///
    /// # Returns
    ///
    /// * `Ok(used)` - The reservation fit; total units now used
    /// * `Err(used)` - The budget is exhausted; units used so far
    pub fn try_reserve(&self, cost: u64) -> Result<u64, u64> {
        let mut state = self.lock();
        if state.exhausted {
            return Err(state.used);
        }

        let next = state.used.saturating_add(cost);
        if next > self.limit {
            state.exhausted = true;
            return Err(state.used);
        }

        state.used = next;
        Ok(next)
    }

    /// Marks the budget as exhausted regardless of the units counted
    pub fn mark_exhausted(&self) {
        self.lock().exhausted = true;
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().exhausted
    }

    pub fn used(&self) -> u64 {
        self.lock().used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        // Counters stay valid across a panic in another holder
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
