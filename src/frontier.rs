//! Crawl frontier: the queue of not-yet-fetched URLs
//!
//! The frontier is a FIFO queue of (URL, depth) pairs plus the visited set
//! that guarantees at-most-once fetching. Both live under a single lock so
//! that `try_mark_visited` and `enqueue` can never interleave in a way that
//! lets two workers claim the same URL.
//!
//! Ordering is pure FIFO, which makes the crawl breadth-first by
//! construction: depth increases monotonically with insertion order. Under
//! concurrency, completion order is still unspecified.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

/// A unit of crawl work: a URL and its link-hop distance from the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL to fetch
    pub url: Url,

    /// Link-hops from the seed (seed itself is depth 0)
    pub depth: u32,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
}

/// Thread-safe FIFO frontier with a visited-set dedup gate
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry unless its URL has already been visited
    ///
    /// Does not itself mark the URL visited: a URL may legitimately sit in
    /// the queue more than once when discovered by several pages; the
    /// `try_mark_visited` gate collapses those to one fetch.
    ///
    /// Returns true if the entry was queued.
    pub fn enqueue(&self, url: Url, depth: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.visited.contains(url.as_str()) {
            return false;
        }
        inner.queue.push_back(FrontierEntry { url, depth });
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Pops the oldest entry, waiting up to `timeout` for one to appear
    ///
    /// Returns None when the timeout elapses with the queue still empty.
    /// Workers use the None signal to detect quiescence; there is no
    /// separate shutdown channel.
    pub async fn dequeue(&self, timeout: Duration) -> Option<FrontierEntry> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.inner.lock().unwrap().queue.pop_front() {
                return Some(entry);
            }

            let remaining = deadline.checked_duration_since(Instant::now())?;
            // A permit stored by a concurrent enqueue is consumed here, so a
            // notification between the pop attempt and this await is not lost.
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;

            if Instant::now() >= deadline {
                return self.inner.lock().unwrap().queue.pop_front();
            }
        }
    }

    /// Atomically claims a URL for fetching
    ///
    /// Returns true only for the first caller for a given URL; that caller is
    /// the one allowed to fetch it. Called immediately before fetching, not at
    /// enqueue time.
    pub fn try_mark_visited(&self, url: &Url) -> bool {
        self.inner
            .lock()
            .unwrap()
            .visited
            .insert(url.as_str().to_string())
    }

    /// Read-only visited check, used to short-circuit before the claim
    pub fn is_visited(&self, url: &Url) -> bool {
        self.inner.lock().unwrap().visited.contains(url.as_str())
    }

    /// Number of entries currently queued
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().queue.is_empty()
    }

    /// Number of URLs claimed for fetching so far
    pub fn visited_count(&self) -> usize {
        self.inner.lock().unwrap().visited.len()
    }

    /// Snapshot of the visited set, for session persistence
    pub fn visited_snapshot(&self) -> HashSet<String> {
        self.inner.lock().unwrap().visited.clone()
    }

    /// Snapshot of the queued entries, for session persistence
    pub fn pending_snapshot(&self) -> Vec<FrontierEntry> {
        self.inner.lock().unwrap().queue.iter().cloned().collect()
    }

    /// Marks a URL visited without claiming it, used when resuming a session
    pub fn restore_visited(&self, url: &str) {
        self.inner.lock().unwrap().visited.insert(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = Frontier::new();
        frontier.enqueue(url("https://a.test/1"), 0);
        frontier.enqueue(url("https://a.test/2"), 1);
        frontier.enqueue(url("https://a.test/3"), 1);

        let timeout = Duration::from_millis(10);
        assert_eq!(
            frontier.dequeue(timeout).await.unwrap().url.as_str(),
            "https://a.test/1"
        );
        assert_eq!(
            frontier.dequeue(timeout).await.unwrap().url.as_str(),
            "https://a.test/2"
        );
        assert_eq!(
            frontier.dequeue(timeout).await.unwrap().url.as_str(),
            "https://a.test/3"
        );
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let frontier = Frontier::new();
        let entry = frontier.dequeue(Duration::from_millis(20)).await;
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let frontier = Arc::new(Frontier::new());

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.enqueue(url("https://a.test/"), 0);

        let entry = waiter.await.unwrap();
        assert_eq!(entry.unwrap().url.as_str(), "https://a.test/");
    }

    #[test]
    fn test_try_mark_visited_first_caller_wins() {
        let frontier = Frontier::new();
        let u = url("https://a.test/page");

        assert!(frontier.try_mark_visited(&u));
        assert!(!frontier.try_mark_visited(&u));
        assert_eq!(frontier.visited_count(), 1);
    }

    #[test]
    fn test_enqueue_skips_visited() {
        let frontier = Frontier::new();
        let u = url("https://a.test/page");

        assert!(frontier.try_mark_visited(&u));
        assert!(!frontier.enqueue(u, 1));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_enqueue_allows_queue_duplicates() {
        // Dedup happens at the visited gate, not at enqueue
        let frontier = Frontier::new();
        assert!(frontier.enqueue(url("https://a.test/page"), 1));
        assert!(frontier.enqueue(url("https://a.test/page"), 1));
        assert_eq!(frontier.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_claims_yield_one_winner() {
        let frontier = Arc::new(Frontier::new());
        let u = url("https://a.test/contested");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let frontier = frontier.clone();
            let u = u.clone();
            handles.push(tokio::spawn(async move { frontier.try_mark_visited(&u) }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_snapshots_and_restore() {
        let frontier = Frontier::new();
        frontier.enqueue(url("https://a.test/p1"), 1);
        frontier.restore_visited("https://a.test/done");

        assert_eq!(frontier.pending_snapshot().len(), 1);
        assert!(frontier.visited_snapshot().contains("https://a.test/done"));
        assert!(!frontier.enqueue(url("https://a.test/done"), 2));
    }
}
