use crate::node::NodeId;
use url::Url;

/// Extracts a node id from a watch link
///
/// Recommendation anchors come in several shapes: relative
/// (`/watch?v=ID&list=...`), absolute (`https://host/watch?v=ID`) or, in
/// older markup, a bare `watch?v=ID`. Every form resolves to the value of the
/// `v` query parameter; anything else is not a recommendation.
///
/// # Arguments
///
/// * `href` - The raw `href` attribute value
///
/// # Returns
///
/// * `Some(NodeId)` - The linked video
/// * `None` - The link does not point at a watch page
///
/// # Examples
///
/// ```
/// use rec_follower::node::from_watch_href;
///
/// let id = from_watch_href("/watch?v=abc123&list=PL1").unwrap();
/// assert_eq!(id.as_str(), "abc123");
/// assert!(from_watch_href("/channel/UC123").is_none());
/// ```
pub fn from_watch_href(href: &str) -> Option<NodeId> {
    // Relative links are resolved against a placeholder host; only the path and
    // query matter here.
    let base = Url::parse("https://placeholder.invalid/").ok()?;
    let url = base.join(href.trim()).ok()?;

    if !url.path().ends_with("/watch") {
        return None;
    }

    url.query_pairs()
        .find(|(key, _)| key == "v")
        .and_then(|(_, value)| NodeId::new(value.into_owned()).ok())
}

/// Builds the watch page URL for a node under `base`
///
/// # Arguments
///
/// * `base` - Site root, e.g. `https://www.youtube.com`
/// * `node_id` - The video to link to
///
/// # Returns
///
/// * `Ok(Url)` - The watch page URL
/// * `Err(url::ParseError)` - `base` cannot be joined with a path
pub fn watch_url(base: &Url, node_id: &NodeId) -> Result<Url, url::ParseError> {
    let mut url = base.join("/watch")?;
    url.query_pairs_mut().clear().append_pair("v", node_id.as_str());
    Ok(url)
}
