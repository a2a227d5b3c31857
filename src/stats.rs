//! Crawl statistics aggregation
//!
//! All counters live behind a single lock, independent of the frontier and
//! politeness locks. The running mean response time is maintained
//! incrementally (`avg += (x - avg) / n`) so no sample history accumulates.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Error kinds counted by the aggregator
///
/// Only transport-level failures are errors. Unwanted HTTP statuses and
/// non-HTML responses are skips, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect or read timeout
    Timeout,
    /// Connection refused, DNS failure, TLS failure
    Connection,
    /// Redirect chain exceeded the limit
    TooManyRedirects,
    /// Request-level HTTP protocol failure
    HttpError,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Stable string form, used for error rows and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::TooManyRedirects => "too_many_redirects",
            Self::HttpError => "http_error",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a URL was considered but not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Deeper than max_depth
    DepthExceeded,
    /// robots.txt disallows the URL
    RobotsDisallowed,
    /// Response carried a non-HTML content type
    NonHtml,
    /// Response status was not a success
    HttpStatus,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepthExceeded => "depth_exceeded",
            Self::RobotsDisallowed => "robots_disallowed",
            Self::NonHtml => "non_html",
            Self::HttpStatus => "http_status",
        }
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    urls_found: u64,
    pages_downloaded: u64,
    pages_skipped: u64,
    skipped_by_reason: HashMap<SkipReason, u64>,
    errors_by_kind: HashMap<ErrorKind, u64>,
    bytes_downloaded: u64,
    avg_response_time: f64,
    response_samples: u64,
    domains: HashSet<String>,
    pages_extracted: u64,
}

/// Read-only snapshot of the counters
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub urls_found: u64,
    pub pages_downloaded: u64,
    pub pages_skipped: u64,
    pub skipped_by_reason: HashMap<SkipReason, u64>,
    pub errors_by_kind: HashMap<ErrorKind, u64>,
    pub bytes_downloaded: u64,
    pub avg_response_time_secs: f64,
    pub domains_crawled: usize,
    pub pages_extracted: u64,
}

impl CrawlStats {
    /// Total error count across kinds
    pub fn total_errors(&self) -> u64 {
        self.errors_by_kind.values().sum()
    }

    /// Downloads as a fraction of everything attempted
    pub fn success_rate(&self) -> f64 {
        let attempts = self.pages_downloaded + self.pages_skipped + self.total_errors();
        if attempts == 0 {
            return 0.0;
        }
        self.pages_downloaded as f64 / attempts as f64 * 100.0
    }
}

/// Thread-safe statistics aggregator for one crawl
#[derive(Debug)]
pub struct StatsAggregator {
    inner: Mutex<StatsInner>,
    started_at: Instant,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
            started_at: Instant::now(),
        }
    }

    /// Counts links that passed admission and were offered to the frontier
    pub fn record_urls_found(&self, count: u64) {
        self.inner.lock().unwrap().urls_found += count;
    }

    /// Records a successful download
    pub fn record_download(&self, domain: &str, bytes: u64, response_time: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages_downloaded += 1;
        inner.bytes_downloaded += bytes;
        inner.domains.insert(domain.to_string());

        inner.response_samples += 1;
        let sample = response_time.as_secs_f64();
        let n = inner.response_samples as f64;
        inner.avg_response_time = inner.avg_response_time + (sample - inner.avg_response_time) / n;
    }

    /// Records a considered-but-not-downloaded URL
    pub fn record_skip(&self, reason: SkipReason) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages_skipped += 1;
        *inner.skipped_by_reason.entry(reason).or_insert(0) += 1;
    }

    /// Records a failed fetch by kind
    pub fn record_error(&self, kind: ErrorKind) {
        let mut inner = self.inner.lock().unwrap();
        *inner.errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Records a successful content extraction
    pub fn record_extracted(&self) {
        self.inner.lock().unwrap().pages_extracted += 1;
    }

    /// Current pages_downloaded value
    pub fn pages_downloaded(&self) -> u64 {
        self.inner.lock().unwrap().pages_downloaded
    }

    /// Takes a consistent snapshot of all counters
    pub fn snapshot(&self) -> CrawlStats {
        let inner = self.inner.lock().unwrap();
        CrawlStats {
            urls_found: inner.urls_found,
            pages_downloaded: inner.pages_downloaded,
            pages_skipped: inner.pages_skipped,
            skipped_by_reason: inner.skipped_by_reason.clone(),
            errors_by_kind: inner.errors_by_kind.clone(),
            bytes_downloaded: inner.bytes_downloaded,
            avg_response_time_secs: inner.avg_response_time,
            domains_crawled: inner.domains.len(),
            pages_extracted: inner.pages_extracted,
        }
    }

    /// Time since the aggregator was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints the end-of-crawl summary to stdout
///
/// Always called at crawl end, including after cancellation; the report then
/// reflects whatever completed before the stop.
pub fn print_report(stats: &CrawlStats, duration: Duration) {
    let secs = duration.as_secs_f64();

    println!("==================================================");
    println!("CRAWLING STATISTICS");
    println!("==================================================");
    println!("Duration: {:.1} seconds ({:.1} minutes)", secs, secs / 60.0);
    println!("URLs Found: {}", stats.urls_found);
    println!("Pages Downloaded: {}", stats.pages_downloaded);
    println!("Content Extracted: {}", stats.pages_extracted);
    println!("Pages Skipped: {}", stats.pages_skipped);
    println!("Domains Crawled: {}", stats.domains_crawled);

    if stats.bytes_downloaded > 0 {
        let mb = stats.bytes_downloaded as f64 / (1024.0 * 1024.0);
        println!("Data Downloaded: {:.2} MB", mb);
    }

    if stats.pages_downloaded > 0 && secs > 0.0 {
        println!(
            "Average Response Time: {:.2}s",
            stats.avg_response_time_secs
        );
        println!(
            "Pages/minute: {:.1}",
            stats.pages_downloaded as f64 / (secs / 60.0)
        );
    }

    let total_errors = stats.total_errors();
    if total_errors > 0 {
        println!("Total Errors: {}", total_errors);
        let mut kinds: Vec<_> = stats.errors_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in kinds {
            println!("  {}: {}", kind, count);
        }
    }

    println!("Success Rate: {:.1}%", stats.success_rate());
    println!("==================================================");
}
