//! Retry policy for unreliable page fetching and parsing
//!
//! Two kinds of failure are retried differently:
//!
//! | Kind      | Attempts                 | Between attempts     | On exhaustion           |
//! |-----------|--------------------------|----------------------|-------------------------|
//! | `Network` | unbounded                | fixed backoff        | never exhausts          |
//! | `Parse`   | `parse_attempts` (10)    | next parse strategy  | best partial result     |
//!
//! Network retries only stop when the crawl's cancellation token fires.

use crate::config::RetryConfig;
use crate::node::NodeId;
use crate::FollowerError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry policy for page fetching and parsing
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    network_backoff: Duration,
    parse_attempts: u32,
}

impl RetryPolicy {
    /// Creates a retry policy
    ///
    /// # Arguments
    ///
    /// * `network_backoff` - Fixed delay between network attempts
    /// * `parse_attempts` - Parse attempts before accepting a short result (at least 1)
    pub fn new(network_backoff: Duration, parse_attempts: u32) -> Self {
        Self {
            network_backoff,
            parse_attempts: parse_attempts.max(1),
        }
    }

    /// Builds the policy from the `[retry]` configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.network_backoff_ms),
            config.parse_attempts,
        )
    }

    /// Runs `operation` until it succeeds, sleeping the fixed backoff between attempts
    ///
    /// Fetch failures are assumed transient, so this never gives up on its own.
    /// Both the operation and the backoff sleep observe `cancel`; once it
    /// fires the call returns `FollowerError::Cancelled`.
    ///
    /// # Arguments
    ///
    /// * `target` - What is being fetched (for logging and the cancel error)
    /// * `cancel` - Cancellation token of the surrounding crawl
    /// * `operation` - Produces one attempt per call
    pub async fn retry_network<S, T, E, F, Fut>(
        &self,
        target: &S,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, FollowerError>
    where
        S: Display + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(FollowerError::Cancelled { target: target.to_string() });
                }
                outcome = operation() => outcome,
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("Fetched {} after {} attempts", target, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt == 1 || attempt % 10 == 0 {
                        tracing::warn!(
                            "Fetch attempt {} for {} failed: {}; retrying in {:?}",
                            attempt,
                            target,
                            e,
                            self.network_backoff
                        );
                    } else {
                        tracing::debug!("Fetch attempt {} for {} failed: {}", attempt, target, e);
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(FollowerError::Cancelled { target: target.to_string() });
                }
                _ = tokio::time::sleep(self.network_backoff) => {}
            }
        }
    }

    /// Runs `operation` until it yields at least `expected` items
    ///
    /// The attempt number (starting at 0) is passed to `operation` so it can
    /// vary its parsing strategy. When every attempt falls short, the longest
    /// result seen is returned and the shortfall is logged; a short parse is
    /// never an error.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The node whose page is parsed (for logging)
    /// * `expected` - Number of items a complete parse yields
    /// * `operation` - Parses once with the given attempt number
    pub fn retry_parse<T, F>(&self, node_id: &NodeId, expected: usize, mut operation: F) -> Vec<T>
    where
        F: FnMut(u32) -> Vec<T>,
    {
        let mut best: Vec<T> = Vec::new();

        for attempt in 0..self.parse_attempts {
            let items = operation(attempt);
            if items.len() >= expected {
                return items;
            }
            tracing::trace!(
                "Parse attempt {} for {} yielded {} of {} items",
                attempt,
                node_id,
                items.len(),
                expected
            );
            if items.len() > best.len() {
                best = items;
            }
        }

        tracing::warn!(
            "Could only parse {} of {} recommendations for {} after {} attempts",
            best.len(),
            expected,
            node_id,
            self.parse_attempts
        );
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn node() -> NodeId {
        NodeId::new("abc").unwrap()
    }

    #[test]
    fn test_parse_attempts_at_least_one() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 0);
        let mut calls = 0;
        let items: Vec<u8> = policy.retry_parse(&node(), 1, |_| {
            calls += 1;
            Vec::new()
        });
        assert!(items.is_empty());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_network_retries_until_success() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 10);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = policy
            .retry_network(&node(), &cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 4 {
                        Err("connection reset")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_network_retry_stops_on_cancel() {
        let policy = RetryPolicy::new(Duration::from_millis(5), 10);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = policy
            .retry_network(&node(), &cancel, || async { Err::<(), _>("unreachable") })
            .await;

        assert!(matches!(result, Err(FollowerError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_network_retry_cancelled_before_start() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = policy
            .retry_network(&node(), &cancel, || async { Ok::<_, String>(1) })
            .await;

        assert!(matches!(result, Err(FollowerError::Cancelled { .. })));
    }

    #[test]
    fn test_parse_returns_first_complete_result() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 10);
        let mut attempts = Vec::new();

        let items = policy.retry_parse(&node(), 3, |attempt| {
            attempts.push(attempt);
            if attempt < 2 {
                vec![1]
            } else {
                vec![1, 2, 3]
            }
        });

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_shortfall_returns_best_partial() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 10);
        let mut calls = 0;

        let items = policy.retry_parse(&node(), 3, |attempt| {
            calls += 1;
            if attempt == 4 {
                vec!["a", "b"]
            } else {
                vec!["a"]
            }
        });

        assert_eq!(items, vec!["a", "b"]);
        assert_eq!(calls, 10);
    }

    #[test]
    fn test_parse_shortfall_may_be_empty() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 3);
        let items: Vec<u8> = policy.retry_parse(&node(), 2, |_| Vec::new());
        assert!(items.is_empty());
    }
}
