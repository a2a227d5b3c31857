//! Worker loop and per-URL state machine
//!
//! Each worker repeatedly pulls an entry from the frontier and walks it
//! through the admission checks in order, each one short-circuiting to a
//! skip: already visited, depth exceeded, budget exhausted, robots
//! disallowed. Only then is the URL claimed, the politeness slot reserved,
//! and the fetch performed. Per-URL failures never terminate the worker.
//!
//! A worker exits when the stop flag is set, the page budget is spent, or a
//! bounded number of consecutive empty dequeues elapse while no other
//! worker holds in-flight work (quiescence).

use crate::crawler::fetcher::{fetch_url, FetchOutcome};
use crate::crawler::pool::{Collaborators, CrawlContext};
use crate::frontier::FrontierEntry;
use crate::stats::SkipReason;
use crate::url::{extract_domain, is_admissible, normalize_url};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// How long one dequeue waits before reporting empty
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

/// Consecutive empty dequeues (with no in-flight work) before a worker exits
const MAX_IDLE_POLLS: u32 = 4;

/// Runs one worker until stop, budget exhaustion, or quiescence
pub(crate) async fn worker_loop(
    ctx: Arc<CrawlContext>,
    collaborators: Collaborators,
    client: Client,
    session_id: Option<i64>,
    worker_id: usize,
) {
    tracing::debug!("Worker {} starting", worker_id);
    let mut idle_polls = 0u32;

    loop {
        if ctx.is_stopping() {
            tracing::debug!("Worker {} observed stop flag", worker_id);
            break;
        }
        if ctx.budget.is_exhausted() {
            tracing::debug!("Worker {} observed page cap", worker_id);
            break;
        }

        match ctx.frontier.dequeue(DEQUEUE_TIMEOUT).await {
            Some(entry) => {
                idle_polls = 0;
                let _work = ctx.begin_work();
                process_entry(&ctx, &collaborators, &client, session_id, entry).await;
            }
            None => {
                if ctx.has_in_flight() {
                    // Someone may still enqueue more; keep waiting
                    idle_polls = 0;
                } else {
                    idle_polls += 1;
                    if idle_polls >= MAX_IDLE_POLLS {
                        tracing::debug!("Worker {} quiescent, exiting", worker_id);
                        break;
                    }
                }
            }
        }
    }
}

/// Walks one frontier entry through the state machine
async fn process_entry(
    ctx: &CrawlContext,
    collaborators: &Collaborators,
    client: &Client,
    session_id: Option<i64>,
    entry: FrontierEntry,
) {
    let url = entry.url;

    // Cheap read first; the atomic claim happens right before the fetch
    if ctx.frontier.is_visited(&url) {
        return;
    }

    if entry.depth > ctx.job.max_depth {
        ctx.stats.record_skip(SkipReason::DepthExceeded);
        return;
    }

    // Reserve a download slot before any further work. A failed reservation
    // means the cap is fully claimed by committed and in-flight pages; the
    // entry is dropped, never fetched.
    if !ctx.budget.try_reserve() {
        return;
    }

    if !ctx.gate.can_fetch(&url).await {
        ctx.budget.cancel();
        ctx.stats.record_skip(SkipReason::RobotsDisallowed);
        tracing::info!("Robots.txt disallows: {}", url);
        return;
    }

    if !ctx.frontier.try_mark_visited(&url) {
        // Another worker claimed it between the pre-check and here
        ctx.budget.cancel();
        return;
    }

    ctx.gate.wait_for_domain(&url).await;

    tracing::info!("Fetching: {}", url);
    match fetch_url(client, &url).await {
        FetchOutcome::Html { page, body } => {
            ctx.budget.commit();

            let domain = extract_domain(&url).unwrap_or_default();
            ctx.stats
                .record_download(&domain, page.byte_length, page.response_time);

            // Extraction is best-effort; failure degrades to no extracted data
            let record = match collaborators.extractor.extract(&body, &url) {
                Ok(record) => {
                    ctx.stats.record_extracted();
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!("Failed to extract content from {}: {}", url, e);
                    None
                }
            };

            if let (Some(store), Some(id)) = (&collaborators.store, session_id) {
                let extracted_json = record
                    .as_ref()
                    .and_then(|r| serde_json::to_string(r).ok());
                let title = record.as_ref().map(|r| r.title.as_str());
                if let Err(e) =
                    store
                        .lock()
                        .unwrap()
                        .save_page(id, &page, title, extracted_json.as_deref())
                {
                    tracing::warn!("Failed to persist page {}: {}", url, e);
                }
            }

            if let Some(writer) = &collaborators.writer {
                if let Err(e) = writer.write_page(&page, &body, record.as_ref()) {
                    tracing::warn!("Failed to write artifacts for {}: {}", url, e);
                }
            }

            collaborators.events.on_page_downloaded(&page);

            // Feed discovered links back, unless this page sits at the depth
            // limit or the cap was just reached
            if entry.depth < ctx.job.max_depth && !ctx.budget.is_exhausted() {
                if let Some(record) = &record {
                    enqueue_links(ctx, record, entry.depth);
                }
            }
        }

        FetchOutcome::Skipped {
            reason,
            status_code,
            content_type,
        } => {
            ctx.budget.cancel();
            ctx.stats.record_skip(reason);
            match reason {
                SkipReason::NonHtml => tracing::info!(
                    "Skipping non-HTML content: {} for {}",
                    content_type.unwrap_or_default(),
                    url
                ),
                _ => tracing::info!(
                    "Skipping {} (HTTP {})",
                    url,
                    status_code.unwrap_or_default()
                ),
            }
        }

        FetchOutcome::Failed { kind, message } => {
            ctx.budget.cancel();
            ctx.stats.record_error(kind);
            tracing::warn!("Fetch failed for {} [{}]: {}", url, kind, message);

            if let (Some(store), Some(id)) = (&collaborators.store, session_id) {
                if let Err(e) = store
                    .lock()
                    .unwrap()
                    .log_error(id, url.as_str(), kind, &message)
                {
                    tracing::warn!("Failed to persist error for {}: {}", url, e);
                }
            }

            collaborators.events.on_error(&url, kind, &message);
        }
    }
}

/// Normalizes, filters, and enqueues a page's discovered links at depth + 1
fn enqueue_links(ctx: &CrawlContext, record: &crate::extract::PageRecord, depth: u32) {
    let mut found = 0u64;

    for link in record.all_links() {
        let Ok(normalized) = normalize_url(&link.url) else {
            continue;
        };
        if !is_admissible(&normalized, ctx.job.allowed_domains()).is_admitted() {
            tracing::debug!("Admission policy rejects {}", normalized);
            continue;
        }

        found += 1;
        ctx.frontier.enqueue(normalized, depth + 1);
    }

    if found > 0 {
        ctx.stats.record_urls_found(found);
    }
}
