//! Crawl event publishing
//!
//! The engine reports progress through this interface, calling subscribers
//! synchronously from worker context. Display concerns (progress bars,
//! dashboards) live entirely on the subscriber side; the core has no
//! dependency on how updates are shown, and the default subscriber shows
//! nothing at all.

use crate::crawler::PageResult;
use crate::stats::{CrawlStats, ErrorKind};
use url::Url;

/// Synchronous event subscriber interface
///
/// Implementations must be cheap and non-blocking; they run on worker tasks.
pub trait CrawlEvents: Send + Sync {
    /// A page was downloaded and counted
    fn on_page_downloaded(&self, page: &PageResult) {
        let _ = page;
    }

    /// A fetch failed with a classified error
    fn on_error(&self, url: &Url, kind: ErrorKind, message: &str) {
        let _ = (url, kind, message);
    }

    /// The crawl finished (completed or interrupted); final counters attached
    fn on_complete(&self, stats: &CrawlStats) {
        let _ = stats;
    }
}

/// Subscriber that ignores every event
pub struct NullEvents;

impl CrawlEvents for NullEvents {}

/// Subscriber that mirrors events into the tracing log
pub struct LogEvents;

impl CrawlEvents for LogEvents {
    fn on_page_downloaded(&self, page: &PageResult) {
        tracing::info!(
            "Downloaded {} ({} bytes, {:.2}s)",
            page.url,
            page.byte_length,
            page.response_time.as_secs_f64()
        );
    }

    fn on_error(&self, url: &Url, kind: ErrorKind, message: &str) {
        tracing::warn!("Error fetching {} [{}]: {}", url, kind, message);
    }

    fn on_complete(&self, stats: &CrawlStats) {
        tracing::info!(
            "Crawl complete: {} downloaded, {} skipped, {} errors",
            stats.pages_downloaded,
            stats.pages_skipped,
            stats.total_errors()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        pages: AtomicUsize,
        errors: AtomicUsize,
        completes: AtomicUsize,
    }

    impl CrawlEvents for Counting {
        fn on_page_downloaded(&self, _page: &PageResult) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _url: &Url, _kind: ErrorKind, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_complete(&self, _stats: &CrawlStats) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_custom_subscriber_receives_events() {
        use chrono::Utc;
        use std::time::Duration;

        let events = Counting {
            pages: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
        };

        let url = Url::parse("https://a.test/").unwrap();
        let page = PageResult {
            url: url.clone(),
            final_url: url.clone(),
            status_code: 200,
            content_type: "text/html".to_string(),
            byte_length: 1,
            response_time: Duration::from_millis(1),
            fetched_at: Utc::now(),
        };

        events.on_page_downloaded(&page);
        events.on_error(&url, ErrorKind::Timeout, "slow");
        events.on_complete(&CrawlStats::default());

        assert_eq!(events.pages.load(Ordering::SeqCst), 1);
        assert_eq!(events.errors.load(Ordering::SeqCst), 1);
        assert_eq!(events.completes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_events_accepts_everything() {
        let events = NullEvents;
        events.on_error(
            &Url::parse("https://a.test/").unwrap(),
            ErrorKind::Other,
            "ignored",
        );
        events.on_complete(&CrawlStats::default());
    }
}
