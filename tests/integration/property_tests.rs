//! Property tests for crawling, sampling and completion

use async_trait::async_trait;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rec_follower::completion::{list_difference, EdgeCorpus, TreeCompleter};
use rec_follower::crawler::{FetchError, PageFetcher, TreeCrawler};
use rec_follower::policy::{RetryPolicy, SamplingPolicy};
use rec_follower::{CrawlParams, NodeId, SearchTree};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NODES: usize = 12;

fn node(ix: usize) -> NodeId {
    NodeId::new(format!("v{}", ix)).expect("valid node id")
}

/// In-memory recommendation graph; pages are comma-separated id lists
struct GraphFetcher {
    graph: HashMap<NodeId, Vec<NodeId>>,
}

impl GraphFetcher {
    fn new(adjacency: &[Vec<usize>]) -> Self {
        Self {
            graph: adjacency
                .iter()
                .enumerate()
                .map(|(from, to)| (node(from), to.iter().map(|&t| node(t)).collect()))
                .collect(),
        }
    }

    /// What an unsampled crawl keeps for `node_id`
    fn expected(&self, node_id: &NodeId, limit: usize) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.graph
            .get(node_id)
            .into_iter()
            .flatten()
            .filter(|r| *r != node_id)
            .filter(|r| seen.insert((*r).clone()))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PageFetcher for GraphFetcher {
    async fn fetch_page(&self, node_id: &NodeId) -> Result<String, FetchError> {
        let children = self.graph.get(node_id).cloned().unwrap_or_default();
        Ok(children
            .iter()
            .map(NodeId::as_str)
            .collect::<Vec<_>>()
            .join(","))
    }

    fn extract_recommendations(
        &self,
        node_id: &NodeId,
        page: &str,
        limit: usize,
        _attempt: u32,
    ) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        page.split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| NodeId::new(s).ok())
            .filter(|id| id != node_id)
            .filter(|id| seen.insert(id.clone()))
            .take(limit)
            .collect()
    }
}

fn arb_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0..NODES, 0..5), NODES)
}

fn arb_params() -> impl Strategy<Value = CrawlParams> {
    (1u32..4, 1u32..4, any::<bool>()).prop_flat_map(|(n, d, sampling)| {
        (0..=d).prop_map(move |c| CrawlParams {
            branching_factor: n,
            max_depth: d,
            sample_threshold_depth: c,
            sampling_enabled: sampling,
        })
    })
}

fn crawl(adjacency: &[Vec<usize>], params: CrawlParams, seed: u64) -> (GraphFetcher, SearchTree) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let crawler = TreeCrawler::new(
        Arc::new(GraphFetcher::new(adjacency)),
        params,
        RetryPolicy::new(Duration::from_millis(1), 1),
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let tree = runtime
        .block_on(crawler.crawl(node(0), &mut rng, &CancellationToken::new()))
        .expect("crawl");

    (GraphFetcher::new(adjacency), tree)
}

fn build_corpus<'a, I>(observations: I) -> EdgeCorpus
where
    I: Iterator<Item = &'a (usize, u32, Vec<usize>)>,
{
    let mut corpus = EdgeCorpus::new();
    for (ix, depth, edges) in observations {
        corpus.insert(node(*ix), *depth, edges.iter().map(|e| node(*e)).collect());
    }
    corpus
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn crawl_respects_tree_invariants(
        adjacency in arb_graph(),
        params in arb_params(),
        seed in any::<u64>(),
    ) {
        let (_, tree) = crawl(&adjacency, params, seed);
        let records = tree.records();

        prop_assert_eq!(&records[0].node_id, &node(0));
        prop_assert_eq!(records[0].depth, 0);

        let mut seen = HashSet::new();
        for record in records {
            prop_assert!(seen.insert(record.node_id.clone()), "{} expanded twice", record.node_id);
            prop_assert!(record.depth <= params.max_depth);
            prop_assert!(record.out_edges.len() <= params.branching_factor as usize);
            if record.depth == params.max_depth {
                prop_assert!(record.out_edges.is_empty(), "leaf {} has children", record.node_id);
            }
        }

        prop_assert!(records.windows(2).all(|w| w[0].depth <= w[1].depth));

        for record in records.iter().filter(|r| r.depth > 0) {
            let has_parent = records
                .iter()
                .filter(|p| p.depth + 1 == record.depth)
                .any(|p| p.out_edges.contains(&record.node_id));
            prop_assert!(has_parent, "{} at depth {} has no parent", record.node_id, record.depth);
        }
    }

    #[test]
    fn unsampled_crawl_keeps_first_recommendations(
        adjacency in arb_graph(),
        params in arb_params(),
    ) {
        let params = CrawlParams { sampling_enabled: false, ..params };
        let (fetcher, tree) = crawl(&adjacency, params, 0);

        for record in tree.records().iter().filter(|r| r.depth < params.max_depth) {
            prop_assert_eq!(
                &record.out_edges,
                &fetcher.expected(&record.node_id, params.branching_factor as usize)
            );
        }
    }

    #[test]
    fn sampling_outside_its_range_is_identity(
        edges in prop::collection::vec(0..NODES, 0..10),
        threshold in 0u32..5,
        depth in 0u32..5,
        enabled in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let policy = SamplingPolicy::new(enabled, threshold);
        let mut rng = StdRng::seed_from_u64(seed);

        let kept = policy.apply(&edges, depth, false, &mut rng);
        if !enabled || depth < threshold {
            prop_assert_eq!(&kept, &edges);
        }
        prop_assert_eq!(policy.apply(&edges, depth, true, &mut rng), edges.clone());

        // Whatever is kept is a subsequence of the input
        let mut rest = edges.iter();
        for item in &kept {
            prop_assert!(rest.any(|e| e == item));
        }
    }

    #[test]
    fn list_difference_is_multiset_subtraction(
        first in prop::collection::vec(0u8..6, 0..12),
        second in prop::collection::vec(0u8..6, 0..12),
    ) {
        let result = list_difference(&first, &second);

        for value in 0u8..6 {
            let count = |xs: &[u8]| xs.iter().filter(|x| **x == value).count();
            let expected = count(&first).saturating_sub(count(&second));
            prop_assert_eq!(count(&result), expected);
        }

        let mut rest = first.iter();
        for item in &result {
            prop_assert!(rest.any(|e| e == item));
        }

        prop_assert_eq!(list_difference(&first, &[]), first.clone());
        prop_assert!(list_difference(&first, &first).is_empty());
    }

    #[test]
    fn corpus_is_independent_of_insertion_order(
        observations in prop::collection::vec(
            (0..NODES, 0u32..4, prop::collection::vec(0..NODES, 0..4)),
            0..24,
        ),
    ) {
        let forward = build_corpus(observations.iter());
        let backward = build_corpus(observations.iter().rev());

        prop_assert_eq!(forward.len(), backward.len());
        for ix in 0..NODES {
            prop_assert_eq!(forward.lookup(&node(ix)), backward.lookup(&node(ix)));
        }
    }

    #[test]
    fn completed_tree_respects_leaf_depth(
        adjacency in arb_graph(),
        params in arb_params(),
        seed in any::<u64>(),
    ) {
        let (_, tree) = crawl(&adjacency, params, seed);
        let corpus = EdgeCorpus::from_trees([&tree]);
        let mut rng = StdRng::seed_from_u64(seed);

        let rows = TreeCompleter::new(&corpus).complete(1, &tree, params.max_depth, &mut rng);

        prop_assert!(rows.iter().all(|r| r.depth <= params.max_depth));
        prop_assert!(rows
            .iter()
            .filter(|r| r.depth == params.max_depth)
            .all(|r| r.recommendation.is_none()));
        prop_assert!(rows
            .windows(2)
            .all(|w| (w[0].depth, &w[0].node_id) <= (w[1].depth, &w[1].node_id)));

        for record in tree.records() {
            prop_assert!(rows
                .iter()
                .any(|r| r.depth == record.depth && r.node_id == record.node_id));
        }
    }
}
