//! HTML parser for extracting recommendations from a watch page
//!
//! Recommendation markup has changed shape many times, so extraction is a
//! family of strategies tried in rotation by attempt number:
//!
//! | Attempt % 3 | Strategy        | Selector                                              |
//! |-------------|-----------------|-------------------------------------------------------|
//! | 0           | `CompactRenderer` | `a.yt-simple-endpoint.ytd-compact-video-renderer` |
//! | 1           | `VideoList`     | `ul.video-list a[href^="/watch"]`                     |
//! | 2           | `AnyWatchLink`  | `a[href*="watch?v="]`                                 |

use crate::node::{from_watch_href, NodeId};
use scraper::{Html, Selector};
use std::collections::HashSet;

/// A way of locating recommendation anchors in a watch page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationStrategy {
    /// Anchors of the compact video renderers in the side panel
    CompactRenderer,

    /// Anchors inside the legacy `video-list` lists
    VideoList,

    /// Any link to a watch page, in document order
    AnyWatchLink,
}

impl RecommendationStrategy {
    /// Strategy used for a given parse attempt
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt % 3 {
            0 => Self::CompactRenderer,
            1 => Self::VideoList,
            _ => Self::AnyWatchLink,
        }
    }

    fn selector(&self) -> &'static str {
        match self {
            Self::CompactRenderer => "a.yt-simple-endpoint.ytd-compact-video-renderer[href]",
            Self::VideoList => r#"ul.video-list a[href^="/watch"]"#,
            Self::AnyWatchLink => r#"a[href*="watch?v="]"#,
        }
    }
}

/// Extracts recommended node ids from a watch page
///
/// # Arguments
///
/// * `html` - The watch page content
/// * `own_id` - The page's own video, never reported as a recommendation
/// * `limit` - Maximum number of recommendations returned
/// * `strategy` - How recommendation anchors are located
///
/// # Returns
///
/// Distinct node ids in document order, at most `limit` of them. Unparseable
/// markup yields an empty list.
pub fn extract_recommendations(
    html: &str,
    own_id: &NodeId,
    limit: usize,
    strategy: RecommendationStrategy,
) -> Vec<NodeId> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(strategy.selector()) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(from_watch_href)
        .filter(|id| id != own_id)
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own() -> NodeId {
        NodeId::new("self1").unwrap()
    }

    fn as_strs(ids: &[NodeId]) -> Vec<&str> {
        ids.iter().map(|id| id.as_str()).collect()
    }

    const COMPACT: &str = r#"
        <html><body>
          <a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v=aaa">A</a>
          <a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v=bbb&amp;t=10">B</a>
          <a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v=aaa">A again</a>
          <a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v=self1">Self</a>
          <a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v=ccc">C</a>
          <a href="/watch?v=zzz">Unrelated</a>
        </body></html>
    "#;

    const LEGACY: &str = r#"
        <html><body>
          <ul class="video-list"><li><a href="/watch?v=up1">Up next</a></li></ul>
          <ul class="video-list">
            <li><a href="/watch?v=r1">R1</a></li>
            <li><a href="/channel/UC123">Channel</a></li>
            <li><a href="/watch?v=r2&amp;list=PL9">R2</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_strategy_rotation() {
        assert_eq!(
            RecommendationStrategy::for_attempt(0),
            RecommendationStrategy::CompactRenderer
        );
        assert_eq!(
            RecommendationStrategy::for_attempt(1),
            RecommendationStrategy::VideoList
        );
        assert_eq!(
            RecommendationStrategy::for_attempt(2),
            RecommendationStrategy::AnyWatchLink
        );
        assert_eq!(
            RecommendationStrategy::for_attempt(3),
            RecommendationStrategy::CompactRenderer
        );
    }

    #[test]
    fn test_compact_renderer_dedups_and_skips_self() {
        let recs = extract_recommendations(
            COMPACT,
            &own(),
            10,
            RecommendationStrategy::CompactRenderer,
        );
        assert_eq!(as_strs(&recs), vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn test_limit_truncates() {
        let recs = extract_recommendations(
            COMPACT,
            &own(),
            2,
            RecommendationStrategy::CompactRenderer,
        );
        assert_eq!(as_strs(&recs), vec!["aaa", "bbb"]);
    }

    #[test]
    fn test_video_list_strategy() {
        let recs = extract_recommendations(LEGACY, &own(), 5, RecommendationStrategy::VideoList);
        assert_eq!(as_strs(&recs), vec!["up1", "r1", "r2"]);
    }

    #[test]
    fn test_strategy_mismatch_yields_nothing() {
        let recs = extract_recommendations(
            LEGACY,
            &own(),
            5,
            RecommendationStrategy::CompactRenderer,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn test_any_watch_link() {
        let recs = extract_recommendations(
            COMPACT,
            &own(),
            10,
            RecommendationStrategy::AnyWatchLink,
        );
        assert_eq!(as_strs(&recs), vec!["aaa", "bbb", "ccc", "zzz"]);
    }

    #[test]
    fn test_garbage_input() {
        let recs = extract_recommendations(
            "<<<not html",
            &own(),
            5,
            RecommendationStrategy::AnyWatchLink,
        );
        assert!(recs.is_empty());
    }
}
