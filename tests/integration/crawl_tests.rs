//! Integration tests for the crawler
//!
//! These tests use wiremock to serve watch and channel pages and run the
//! full crawl, completion and statistics cycle end-to-end.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rec_follower::completion::complete_searches;
use rec_follower::config::{load_config_with_hash, Config};
use rec_follower::crawler::{crawl, Coordinator, CrawlTarget};
use rec_follower::output::load_statistics;
use rec_follower::storage::{open_storage, Storage};
use rec_follower::NodeId;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn id(s: &str) -> NodeId {
    NodeId::new(s).expect("valid node id")
}

/// Writes a config file listing `roots` under the query "news"
fn write_config(dir: &Path, base_url: &str, roots: &[&str]) -> (Config, String) {
    let videos = roots
        .iter()
        .map(|r| format!("\"{}\"", r))
        .collect::<Vec<_>>()
        .join(", ");
    let roots_table = format!("[[roots]]\nquery = \"news\"\nvideos = [{}]\n", videos);
    write_config_with_roots(dir, base_url, &roots_table)
}

/// Writes a config file pointing at the mock server and loads it back
fn write_config_with_roots(dir: &Path, base_url: &str, roots_table: &str) -> (Config, String) {
    let db_path = dir.join("crawl.sqlite");
    let toml = format!(
        r#"
[crawler]
branching-factor = 2
max-depth = 2
sample-threshold-depth = 2
sampling = false
max-concurrent-crawls = 2
sampling-seed = 11

[retry]
network-backoff-ms = 10
parse-attempts = 1

[fetcher]
base-url = "{base_url}"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db}"

{roots_table}"#,
        base_url = base_url,
        db = db_path.display(),
        roots_table = roots_table
    );

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, toml).expect("write config");
    load_config_with_hash(&config_path).expect("load config")
}

/// Mounts the watch page of `video` listing `recommendations`
async fn mount_watch_page(server: &MockServer, video: &str, channel: &str, recommendations: &[&str]) {
    let anchors: String = recommendations
        .iter()
        .map(|r| {
            format!(
                r#"<a class="yt-simple-endpoint ytd-compact-video-renderer" href="/watch?v={}">{}</a>"#,
                r, r
            )
        })
        .collect();
    let body = format!(
        r#"<html><head>
        <meta itemprop="name" content="Video {video}">
        <meta itemprop="channelId" content="{channel}">
        <meta itemprop="interactionCount" content="1,000 views">
        </head><body>{anchors}</body></html>"#,
        video = video,
        channel = channel,
        anchors = anchors
    );

    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", video))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_channel_page(server: &MockServer, channel: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/channel/{}", channel)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><head><meta property="og:title" content="Channel {}"></head></html>"#,
                    channel
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// A -> [B, C], B -> [D, E], C -> [D, F]
async fn mount_site(server: &MockServer) {
    mount_watch_page(server, "A", "UCnews", &["B", "C"]).await;
    mount_watch_page(server, "B", "UCnews", &["D", "E"]).await;
    mount_watch_page(server, "C", "UCnews", &["D", "F"]).await;
    mount_watch_page(server, "D", "UCmusic", &[]).await;
    mount_watch_page(server, "E", "UCmusic", &[]).await;
    mount_watch_page(server, "F", "UCmusic", &[]).await;
    mount_channel_page(server, "UCnews").await;
    mount_channel_page(server, "UCmusic").await;
}

#[tokio::test]
async fn test_full_crawl_and_completion() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().expect("temp dir");
    let (config, hash) = write_config(dir.path(), &server.uri(), &["A"]);
    let coordinator = Coordinator::from_config(&config, hash.clone()).expect("coordinator");

    let report = coordinator
        .run(CrawlTarget::from_roots(&config.roots), false, CancellationToken::new())
        .await
        .expect("crawl run");

    assert_eq!(report.completed.len(), 1, "report: {:?}", report);
    assert!(report.failed.is_empty());
    assert!(report.halted.is_none());
    let search_id = report.completed[0].1;

    let storage = coordinator.storage();
    let mut storage = storage.lock().expect("storage lock");

    let run = storage.get_search(search_id).expect("search row");
    assert_eq!(run.query, "news");
    assert_eq!(run.root, id("A"));
    assert_eq!(run.config_hash, hash);

    let tree = storage.load_search_tree(search_id).expect("tree");
    assert_eq!(tree.len(), 6);
    assert_eq!(tree.get(&id("A")).map(|r| r.out_edges.clone()), Some(vec![id("B"), id("C")]));
    assert_eq!(tree.get(&id("C")).map(|r| r.out_edges.clone()), Some(vec![id("D"), id("F")]));
    for leaf in ["D", "E", "F"] {
        let record = tree.get(&id(leaf)).expect("leaf record");
        assert_eq!(record.depth, 2);
        assert!(record.out_edges.is_empty());
    }

    let video = storage.get_video(&id("B")).expect("query").expect("video stored");
    assert_eq!(video.title.as_deref(), Some("Video B"));
    assert_eq!(video.channel_id.as_deref(), Some("UCnews"));
    assert_eq!(video.views, Some(1000));
    assert_eq!(storage.count_videos().expect("count"), 6);
    assert_eq!(storage.count_channels().expect("count"), 2);

    let mut rng = StdRng::seed_from_u64(3);
    let completion = complete_searches(&mut *storage, None, None, &mut rng).expect("completion");
    assert_eq!(completion.searches, 1);

    // D is recommended twice at depth 2 but expanded once; the second one
    // becomes a childless leaf
    let rows = storage.load_completed_tree(search_id).expect("completed rows");
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r.depth <= 2));
    assert_eq!(
        rows.iter()
            .filter(|r| r.depth == 2 && r.node_id == id("D"))
            .count(),
        2
    );
    assert!(rows
        .windows(2)
        .all(|w| (w[0].depth, &w[0].node_id) <= (w[1].depth, &w[1].node_id)));

    let stats = load_statistics(&*storage).expect("stats");
    assert_eq!(stats.searches, 1);
    assert_eq!(stats.expanded_nodes, 6);
    assert_eq!(stats.edges, 6);
    assert_eq!(stats.completed_searches, 1);
    assert_eq!(stats.completed_rows, 10);
}

#[tokio::test]
async fn test_existing_tree_is_skipped() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().expect("temp dir");
    let (config, hash) = write_config(dir.path(), &server.uri(), &["A"]);
    let targets = CrawlTarget::from_roots(&config.roots);

    let first = Coordinator::from_config(&config, hash.clone())
        .expect("coordinator")
        .run(targets.clone(), false, CancellationToken::new())
        .await
        .expect("first run");
    assert_eq!(first.completed.len(), 1);

    // A second process over the same database
    let coordinator = Coordinator::from_config(&config, hash).expect("coordinator");
    let plan = coordinator.plan(&targets, false).expect("plan");
    assert!(plan[0].already_exists);

    let second = coordinator
        .run(targets, false, CancellationToken::new())
        .await
        .expect("second run");
    assert!(second.completed.is_empty());
    assert_eq!(second.skipped_existing, vec![CrawlTarget::new("news", id("A"))]);
}

#[tokio::test]
async fn test_unavailable_root_is_reported() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", "gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (config, hash) = write_config(dir.path(), &server.uri(), &["gone", "A"]);
    let coordinator = Coordinator::from_config(&config, hash).expect("coordinator");

    let report = coordinator
        .run(CrawlTarget::from_roots(&config.roots), false, CancellationToken::new())
        .await
        .expect("crawl run");

    assert_eq!(report.unavailable_roots, vec![CrawlTarget::new("news", id("gone"))]);
    assert_eq!(report.completed.len(), 1);

    let storage = coordinator.storage();
    let storage = storage.lock().expect("storage lock");
    assert_eq!(storage.count_searches().expect("count"), 1);
    assert!(!storage.search_exists("news", &id("gone")).expect("query"));
}

#[tokio::test]
async fn test_missing_inner_page_is_a_dead_end() {
    let server = MockServer::start().await;
    mount_watch_page(&server, "A", "UCnews", &["B", "G"]).await;
    mount_watch_page(&server, "B", "UCnews", &["D", "E"]).await;
    mount_watch_page(&server, "D", "UCnews", &[]).await;
    mount_watch_page(&server, "E", "UCnews", &[]).await;
    mount_channel_page(&server, "UCnews").await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", "G"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (config, hash) = write_config(dir.path(), &server.uri(), &["A"]);
    let coordinator = Coordinator::from_config(&config, hash).expect("coordinator");

    let report = coordinator
        .run(CrawlTarget::from_roots(&config.roots), false, CancellationToken::new())
        .await
        .expect("crawl run");
    assert_eq!(report.completed.len(), 1, "report: {:?}", report);

    let storage = coordinator.storage();
    let storage = storage.lock().expect("storage lock");
    let tree = storage
        .load_search_tree(report.completed[0].1)
        .expect("tree");

    let dead_end = tree.get(&id("G")).expect("G recorded");
    assert_eq!(dead_end.depth, 1);
    assert!(dead_end.out_edges.is_empty());
    assert_eq!(tree.len(), 5);

    // G has no page, so no metadata either
    assert!(storage.get_video(&id("G")).expect("query").is_none());
    assert_eq!(storage.count_videos().expect("count"), 4);
}

#[tokio::test]
async fn test_roots_found_by_search() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .and(query_param("search_query", "breaking news"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <a id="video-title" href="/watch?v=A">A</a>
                    <a id="video-title" href="/watch?v=E">E</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (config, hash) = write_config_with_roots(
        dir.path(),
        &server.uri(),
        "[[roots]]\nquery = \"breaking news\"\nmax-results = 1\n",
    );

    let report = crawl(&config, hash, false, CancellationToken::new())
        .await
        .expect("crawl run");

    assert_eq!(report.completed.len(), 1, "report: {:?}", report);
    assert_eq!(report.completed[0].0, CrawlTarget::new("breaking news", id("A")));

    let storage = open_storage(Path::new(&config.output.database_path))
        .expect("reopen storage");
    assert!(storage.search_exists("breaking news", &id("A")).expect("query"));
    assert!(!storage.search_exists("breaking news", &id("E")).expect("query"));
}
