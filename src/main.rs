//! Pagehaul main entry point
//!
//! Command-line interface for the Pagehaul web page downloader.

use clap::Parser;
use pagehaul::artifacts::PageWriter;
use pagehaul::config::{build_job, compute_config_hash, load_file_config, FileConfig, JobOverrides};
use pagehaul::crawler::{Collaborators, WorkerPool};
use pagehaul::events::LogEvents;
use pagehaul::stats::print_report;
use pagehaul::storage::{SessionStore, SqliteSessionStore};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Pagehaul: a polite, bounded web page downloader
///
/// Crawls breadth-first from a seed URL while respecting robots.txt and
/// per-domain request spacing. Downloads pages into a per-domain directory
/// layout and records sessions in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "pagehaul")]
#[command(version = "1.0.0")]
#[command(about = "A polite, bounded web page downloader", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL", required_unless_present = "list_sessions")]
    url: Option<String>,

    /// Path to the YAML configuration file
    #[arg(long, default_value = "crawler_config.yaml")]
    config: PathBuf,

    /// Maximum crawling depth (overrides config)
    #[arg(long)]
    max_depth: Option<u32>,

    /// Delay between same-domain requests in seconds (overrides config)
    #[arg(long)]
    delay: Option<f64>,

    /// Maximum number of pages to download (overrides config)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Output directory (overrides config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Allowed domains; others are never crawled (overrides config)
    #[arg(long, num_args = 1..)]
    allowed_domains: Option<Vec<String>>,

    /// User agent string (overrides config)
    #[arg(long)]
    user_agent: Option<String>,

    /// Number of concurrent workers, clamped to 1-10 (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Disable session recording in the SQLite database
    #[arg(long)]
    no_database: bool,

    /// List interrupted/running sessions from the database and exit
    #[arg(long, conflicts_with = "no_database")]
    list_sessions: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // The defaults file is optional; a missing file means built-in defaults
    let (file_config, config_hash) = if cli.config.exists() {
        tracing::info!("Loading configuration from: {}", cli.config.display());
        let config = load_file_config(&cli.config)?;
        let hash = compute_config_hash(&cli.config)?;
        (config, Some(hash))
    } else {
        tracing::debug!(
            "Configuration file {} not found, using defaults",
            cli.config.display()
        );
        (FileConfig::default(), None)
    };

    let overrides = JobOverrides {
        max_depth: cli.max_depth,
        delay: cli.delay,
        max_pages: cli.max_pages,
        workers: cli.workers,
        output_dir: cli.output_dir.clone(),
        allowed_domains: cli.allowed_domains.clone(),
        user_agent: cli.user_agent.clone(),
        database: if cli.no_database { Some(false) } else { None },
    };

    if cli.list_sessions {
        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| file_config.output.directory.clone())
            .unwrap_or_else(|| PathBuf::from("downloaded_pages"));
        return handle_list_sessions(&output_dir.join("crawler_data.db"));
    }

    let seed = cli
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("a seed URL is required"))?;
    let job = build_job(seed, &file_config, &overrides, config_hash)?;

    handle_crawl(job).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagehaul=info,warn"),
            1 => EnvFilter::new("pagehaul=debug,info"),
            2 => EnvFilter::new("pagehaul=trace,debug"),
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

/// Handles --list-sessions: prints incomplete sessions and exits
fn handle_list_sessions(database_path: &std::path::Path) -> anyhow::Result<()> {
    let store = SqliteSessionStore::new(database_path)?;
    let sessions = store.list_incomplete_sessions()?;

    if sessions.is_empty() {
        println!("No incomplete sessions.");
        return Ok(());
    }

    println!("Incomplete sessions:");
    for session in sessions {
        println!(
            "  #{} {} [{}] started {} ({} pages, {} errors)",
            session.id,
            session.start_url,
            session.status.to_db_string(),
            session.started_at,
            session.pages_crawled,
            session.total_errors
        );
    }

    Ok(())
}

/// Runs the crawl and prints the final report
async fn handle_crawl(job: pagehaul::CrawlJob) -> anyhow::Result<()> {
    tracing::info!(
        "Settings: depth={}, pages={}, delay={:.1}s, workers={}",
        job.max_depth,
        job.max_pages,
        job.delay.as_secs_f64(),
        job.max_workers
    );

    let store: Option<Arc<Mutex<dyn SessionStore>>> = if job.database_enabled {
        match SqliteSessionStore::new(&job.database_path()) {
            Ok(store) => Some(Arc::new(Mutex::new(store))),
            Err(e) => {
                tracing::warn!("Failed to open database, continuing without: {}", e);
                None
            }
        }
    } else {
        None
    };

    let writer = Arc::new(PageWriter::new(&job.output_dir)?);

    let collaborators = Collaborators {
        store,
        writer: Some(writer),
        events: Arc::new(LogEvents),
        ..Collaborators::default()
    };

    let pool = WorkerPool::new(job, collaborators)?;

    // Ctrl-C flips the shared stop flag; workers observe it at loop
    // boundaries and the session ends as interrupted.
    let ctx = pool.context();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight pages");
            ctx.request_stop();
        }
    });

    let started = Instant::now();
    let stats = pool.run().await?;
    print_report(&stats, started.elapsed());

    Ok(())
}
