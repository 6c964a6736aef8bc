//! Rec-Follower main entry point
//!
//! This is the command-line interface for the Rec-Follower recommendation
//! tree crawler.

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rec_follower::completion::complete_searches;
use rec_follower::config::{load_config_with_hash, Config};
use rec_follower::crawler::{crawl, Coordinator, CrawlTarget};
use rec_follower::output::{load_statistics, print_statistics};
use rec_follower::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Rec-Follower: a recommendation tree crawler
///
/// Rec-Follower follows the "recommended next" links of a video site from a
/// set of root videos, records a bounded sample of that graph per root, and
/// reconstructs fuller trees offline from everything crawled so far.
#[derive(Parser, Debug)]
#[command(name = "rec-follower")]
#[command(version)]
#[command(about = "A recommendation tree crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl every root, even those whose tree already exists
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "complete"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "complete"])]
    stats: bool,

    /// Complete stored trees against every crawl seen so far and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    complete: bool,

    /// Complete only this search
    #[arg(long, requires = "complete")]
    search_id: Option<i64>,

    /// Depth to complete trees to (default: each search's own max depth)
    #[arg(long, requires = "complete")]
    target_depth: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, config_hash, cli.fresh)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.complete {
        handle_complete(&config, cli.search_id, cli.target_depth)?;
    } else {
        handle_crawl(&config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rec_follower=info,warn"),
            1 => EnvFilter::new("rec_follower=debug,info"),
            2 => EnvFilter::new("rec_follower=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    println!("=== Rec-Follower Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Branching factor: {}", config.crawler.branching_factor);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Sampling: {} (from depth {})",
        if config.crawler.sampling { "on" } else { "off" },
        config.crawler.sample_threshold_depth
    );
    println!(
        "  Max concurrent crawls: {}",
        config.crawler.max_concurrent_crawls
    );

    println!("\nMetadata:");
    println!("  Daily quota: {} units", config.metadata.daily_quota);
    println!(
        "  Batch sizes: {} videos, {} channels",
        config.metadata.video_batch_size, config.metadata.channel_batch_size
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let coordinator = Coordinator::from_config(config, config_hash)?;
    let plan = coordinator.plan(&CrawlTarget::from_roots(&config.roots), fresh)?;

    println!("\nListed roots ({}):", plan.len());
    for planned in &plan {
        let status = if planned.already_exists {
            "exists, would skip"
        } else {
            "would crawl"
        };
        println!(
            "  - {} ({}): {}",
            planned.target.root, planned.target.query, status
        );
    }

    let searches = config
        .roots
        .iter()
        .filter_map(|r| r.max_results.map(|max| (&r.query, max)));
    for (query, max_results) in searches {
        println!("  - search '{}' for up to {} more roots", query, max_results);
    }

    let to_crawl = plan.iter().filter(|p| !p.already_exists).count();
    let cost: u64 = plan
        .iter()
        .filter(|p| !p.already_exists)
        .map(|p| p.estimated_cost)
        .sum();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} listed roots, reserving {} of {} quota units",
        to_crawl, cost, config.metadata.daily_quota
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --complete mode: rebuilds completed trees
fn handle_complete(
    config: &Config,
    search_id: Option<i64>,
    target_depth: Option<u32>,
) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let mut rng = match config.crawler.sampling_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let report = complete_searches(&mut storage, search_id, target_depth, &mut rng)
        .context("tree completion failed")?;

    println!(
        "✓ Completed {} searches ({} rows) against {} corpus entries",
        report.searches, report.rows, report.corpus_entries
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (re-crawling existing trees)");
    }

    tracing::info!(
        "Root groups: {}, listed roots: {}, searched groups: {}",
        config.roots.len(),
        config.roots.iter().map(|r| r.videos.len()).sum::<usize>(),
        config.roots.iter().filter(|r| r.max_results.is_some()).count()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling running crawls");
            on_interrupt.cancel();
        }
    });

    let report = crawl(config, config_hash, fresh, cancel).await?;
    report.log_summary();

    Ok(())
}
