//! Crawl engine
//!
//! This module contains the concurrent core of Pagehaul:
//! - HTTP fetching with retry and outcome classification
//! - The per-URL state machine each worker runs
//! - The worker pool and the shared crawl context

mod fetcher;
mod pool;
mod worker;

pub use fetcher::{build_http_client, fetch_url, FetchOutcome, PageResult};
pub use pool::{Collaborators, CrawlContext, PageBudget, WorkerPool};

use crate::config::CrawlJob;
use crate::stats::CrawlStats;
use crate::Result;

/// Runs a complete crawl for one job
///
/// Convenience entry point over [`WorkerPool`]: builds the pool, runs it to
/// completion, and returns the final statistics snapshot.
///
/// # Example
///
/// ```no_run
/// use pagehaul::config::{build_job, FileConfig, JobOverrides};
/// use pagehaul::crawler::{crawl, Collaborators};
///
/// # async fn example() -> pagehaul::Result<()> {
/// let job = build_job("https://example.com/", &FileConfig::default(), &JobOverrides::default(), None)?;
/// let stats = crawl(job, Collaborators::default()).await?;
/// println!("Downloaded {} pages", stats.pages_downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(job: CrawlJob, collaborators: Collaborators) -> Result<CrawlStats> {
    WorkerPool::new(job, collaborators)?.run().await
}
