//! Worker pool and shared crawl context
//!
//! The [`CrawlContext`] is the explicit home of every piece of state the
//! workers share: the frontier, the politeness gate, the page budget, the
//! statistics aggregator, and the stop flag. Workers receive it as an `Arc`;
//! there are no ambient singletons.
//!
//! The page cap is enforced by a reserve/commit budget: a worker reserves a
//! slot before fetching, commits it only when the fetch succeeds, and
//! cancels it otherwise. `pages_downloaded` therefore never exceeds
//! `max_pages`, with an overshoot bound of exactly zero.

use crate::artifacts::PageWriter;
use crate::config::CrawlJob;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::worker::worker_loop;
use crate::events::{CrawlEvents, NullEvents};
use crate::extract::{Extractor, HtmlExtractor};
use crate::frontier::Frontier;
use crate::politeness::PolitenessGate;
use crate::stats::{CrawlStats, StatsAggregator};
use crate::storage::{SessionStatus, SessionStore};
use crate::Result;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Reserve/commit page budget
///
/// `committed + reserved` can never exceed `max`, so the number of
/// successful downloads is capped without any overshoot window between
/// checking and incrementing.
#[derive(Debug)]
pub struct PageBudget {
    max: u32,
    inner: Mutex<BudgetInner>,
}

#[derive(Debug, Default)]
struct BudgetInner {
    committed: u32,
    reserved: u32,
}

impl PageBudget {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            inner: Mutex::new(BudgetInner::default()),
        }
    }

    /// Reserves one download slot; false when the budget is fully claimed
    pub fn try_reserve(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.committed + inner.reserved >= self.max {
            return false;
        }
        inner.reserved += 1;
        true
    }

    /// Converts a reservation into a counted download
    pub fn commit(&self) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.reserved > 0, "commit without reservation");
        inner.reserved = inner.reserved.saturating_sub(1);
        inner.committed += 1;
    }

    /// Returns a reservation unused (fetch skipped or failed)
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.reserved > 0, "cancel without reservation");
        inner.reserved = inner.reserved.saturating_sub(1);
    }

    /// Number of committed downloads
    pub fn committed(&self) -> u32 {
        self.inner.lock().unwrap().committed
    }

    /// True once the committed count has reached the cap
    ///
    /// Workers stop pulling work when this turns true; outstanding
    /// reservations do not count, since they may still cancel.
    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().unwrap().committed >= self.max
    }
}

/// Shared state for one crawl, passed explicitly to every worker
pub struct CrawlContext {
    pub job: CrawlJob,
    pub frontier: Frontier,
    pub gate: PolitenessGate,
    pub budget: PageBudget,
    pub stats: StatsAggregator,
    stopping: AtomicBool,
    in_flight: AtomicUsize,
}

impl CrawlContext {
    pub fn new(job: CrawlJob, client: Client) -> Self {
        let gate = PolitenessGate::new(job.delay, job.user_agent.clone(), client);
        let budget = PageBudget::new(job.max_pages);
        Self {
            job,
            frontier: Frontier::new(),
            gate,
            budget,
            stats: StatsAggregator::new(),
            stopping: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Requests a cooperative stop; workers observe it at loop boundaries
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Marks this worker as holding in-flight work until the guard drops
    pub(crate) fn begin_work(&self) -> WorkGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        WorkGuard(self)
    }

    /// True while any worker is processing a dequeued entry
    ///
    /// Used for quiescence detection: an idle worker only counts empty
    /// timeouts toward shutdown while nobody else holds work that could
    /// still enqueue more URLs.
    pub(crate) fn has_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

pub(crate) struct WorkGuard<'a>(&'a CrawlContext);

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// External collaborators handed to the pool
///
/// Extraction, persistence, artifact writing, and event publishing are all
/// interface-bounded and best-effort from the engine's point of view.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn Extractor>,
    pub store: Option<Arc<Mutex<dyn SessionStore>>>,
    pub writer: Option<Arc<PageWriter>>,
    pub events: Arc<dyn CrawlEvents>,
}

impl Default for Collaborators {
    /// Default extractor, no persistence, no artifacts, no event output
    fn default() -> Self {
        Self {
            extractor: Arc::new(HtmlExtractor::default()),
            store: None,
            writer: None,
            events: Arc::new(NullEvents),
        }
    }
}

/// Fixed-size worker pool driving one crawl to completion
pub struct WorkerPool {
    ctx: Arc<CrawlContext>,
    collaborators: Collaborators,
    client: Client,
}

impl WorkerPool {
    /// Builds the HTTP client and shared context for a job
    pub fn new(job: CrawlJob, collaborators: Collaborators) -> Result<Self> {
        let client = build_http_client(&job.user_agent)?;
        let ctx = Arc::new(CrawlContext::new(job, client.clone()));
        Ok(Self {
            ctx,
            collaborators,
            client,
        })
    }

    /// Shared context handle, e.g. for wiring a signal handler to `request_stop`
    pub fn context(&self) -> Arc<CrawlContext> {
        self.ctx.clone()
    }

    /// Loads an interrupted session's saved state into the frontier
    ///
    /// Marks previously visited URLs so they are never fetched again and
    /// re-queues the pending entries. Call before [`run`](Self::run).
    /// Returns how many pending entries were queued.
    pub fn resume_from(&self, session_id: i64) -> Result<usize> {
        let Some(store) = &self.collaborators.store else {
            return Ok(0);
        };
        let store = store.lock().unwrap();

        let visited = store.load_visited(session_id)?;
        for url in &visited {
            self.ctx.frontier.restore_visited(url);
        }

        let mut queued = 0;
        for entry in store.load_pending_work(session_id)? {
            if self.ctx.frontier.enqueue(entry.url, entry.depth) {
                queued += 1;
            }
        }

        tracing::info!(
            "Resumed session {}: {} visited URLs, {} pending entries",
            session_id,
            visited.len(),
            queued
        );
        Ok(queued)
    }

    /// Runs the crawl to quiescence, cap, or stop; returns final statistics
    ///
    /// The session lifecycle (start/end rows, resume state on interruption)
    /// is managed here. Every store interaction is best-effort: a failure is
    /// logged and the crawl proceeds.
    pub async fn run(&self) -> Result<CrawlStats> {
        let job = &self.ctx.job;
        tracing::info!(
            "Starting crawl from {} (depth {}, pages {}, {} workers)",
            job.seed_url,
            job.max_depth,
            job.max_pages,
            job.max_workers
        );

        let session_id = self.start_session();

        if !self.ctx.frontier.enqueue(job.seed_url.clone(), 0) {
            // Normal when resuming: the seed was fetched in the original run
            tracing::debug!("Seed {} already visited, not re-queued", job.seed_url);
        }

        let mut handles = Vec::with_capacity(job.max_workers);
        for worker_id in 0..job.max_workers {
            let ctx = self.ctx.clone();
            let collaborators = self.collaborators.clone();
            let client = self.client.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(ctx, collaborators, client, session_id, worker_id).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task panicked: {}", e);
            }
        }

        let stats = self.ctx.stats.snapshot();
        let status = if self.ctx.is_stopping() {
            SessionStatus::Interrupted
        } else {
            SessionStatus::Completed
        };
        self.finish_session(session_id, &stats, status);

        self.collaborators.events.on_complete(&stats);
        tracing::info!(
            "Crawl {}: {} pages downloaded in {:?}",
            status.to_db_string(),
            stats.pages_downloaded,
            self.ctx.stats.elapsed()
        );

        Ok(stats)
    }

    /// Opens the session row; None when persistence is disabled or failing
    fn start_session(&self) -> Option<i64> {
        let store = self.collaborators.store.as_ref()?;
        let job = &self.ctx.job;
        let result = store.lock().unwrap().start_session(
            job.seed_url.as_str(),
            job.max_depth,
            job.max_pages,
            job.config_hash.as_deref(),
        );
        match result {
            Ok(id) => {
                tracing::debug!("Started session {}", id);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Failed to start session, continuing without: {}", e);
                None
            }
        }
    }

    /// Closes the session row; on interruption also saves resume state
    fn finish_session(&self, session_id: Option<i64>, stats: &CrawlStats, status: SessionStatus) {
        let (Some(store), Some(id)) = (self.collaborators.store.as_ref(), session_id) else {
            return;
        };

        let mut store = store.lock().unwrap();
        if status == SessionStatus::Interrupted {
            let pending = self.ctx.frontier.pending_snapshot();
            let visited = self.ctx.frontier.visited_snapshot();
            if let Err(e) = store.save_pending_work(id, &pending) {
                tracing::warn!("Failed to save pending work: {}", e);
            }
            if let Err(e) = store.save_visited(id, &visited) {
                tracing::warn!("Failed to save visited set: {}", e);
            }
        }

        if let Err(e) = store.end_session(id, stats.pages_downloaded, stats.total_errors(), status)
        {
            tracing::warn!("Failed to end session {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_caps_reservations() {
        let budget = PageBudget::new(2);
        assert!(budget.try_reserve());
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());
    }

    #[test]
    fn test_budget_commit_counts() {
        let budget = PageBudget::new(2);
        budget.try_reserve();
        budget.commit();
        assert_eq!(budget.committed(), 1);
        assert!(!budget.is_exhausted());

        budget.try_reserve();
        budget.commit();
        assert!(budget.is_exhausted());
        assert!(!budget.try_reserve());
    }

    #[test]
    fn test_budget_cancel_frees_slot() {
        let budget = PageBudget::new(1);
        assert!(budget.try_reserve());
        assert!(!budget.try_reserve());

        budget.cancel();
        assert!(budget.try_reserve());
        assert_eq!(budget.committed(), 0);
    }

    #[test]
    fn test_budget_never_overshoots_under_contention() {
        use std::sync::Arc;
        use std::thread;

        let budget = Arc::new(PageBudget::new(10));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let budget = budget.clone();
            handles.push(thread::spawn(move || {
                let mut wins = 0u32;
                for i in 0..100 {
                    if budget.try_reserve() {
                        // Alternate success and failure paths
                        if i % 2 == 0 {
                            budget.commit();
                            wins += 1;
                        } else {
                            budget.cancel();
                        }
                    }
                }
                wins
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, budget.committed());
        assert!(budget.committed() <= 10);
    }

    #[test]
    fn test_context_stop_flag() {
        use crate::config::{build_job, FileConfig, JobOverrides};

        let job = build_job(
            "https://example.com/",
            &FileConfig::default(),
            &JobOverrides::default(),
            None,
        )
        .unwrap();
        let ctx = CrawlContext::new(job, Client::new());

        assert!(!ctx.is_stopping());
        ctx.request_stop();
        assert!(ctx.is_stopping());
    }

    #[test]
    fn test_in_flight_guard() {
        use crate::config::{build_job, FileConfig, JobOverrides};

        let job = build_job(
            "https://example.com/",
            &FileConfig::default(),
            &JobOverrides::default(),
            None,
        )
        .unwrap();
        let ctx = CrawlContext::new(job, Client::new());

        assert!(!ctx.has_in_flight());
        {
            let _guard = ctx.begin_work();
            assert!(ctx.has_in_flight());
        }
        assert!(!ctx.has_in_flight());
    }
}
