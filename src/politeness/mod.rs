//! Politeness gate: robots.txt compliance and per-domain request spacing
//!
//! One gate instance serves all workers. It owns two pieces of shared state,
//! each behind its own lock so unrelated domains never serialize each other
//! against the frontier:
//!
//! - a per-origin robots cache, populated lazily with at most one fetch per
//!   origin (concurrent lookups for the same origin coalesce on a OnceCell)
//! - a per-domain reservation map used to space out same-domain requests
//!
//! Rate limiting uses an atomic reserve-slot scheme rather than
//! check-sleep-record: under the domain lock, a caller claims
//! `start = max(now, next_allowed)` and advances
//! `next_allowed = start + delay`, then sleeps outside the lock until its
//! claimed start time. Two workers hammering the same domain therefore get
//! strictly spaced start times; there is no window where both observe "no
//! wait needed".

mod robots;

pub use robots::ParsedRobots;

use crate::url::{extract_domain, origin_of};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use url::Url;

/// Per-domain reservation state, owned exclusively by the gate
#[derive(Debug)]
struct DomainSlot {
    /// Earliest time the next request to this domain may start
    next_allowed: Instant,
}

/// Robots.txt compliance plus per-domain minimum-interval rate limiting
pub struct PolitenessGate {
    /// Configured minimum interval between same-domain requests
    delay: Duration,

    /// User agent evaluated against robots rules
    user_agent: String,

    /// Shared HTTP client, used only for robots.txt fetches
    client: Client,

    /// origin -> lazily fetched robots rules
    robots: Mutex<HashMap<String, Arc<OnceCell<ParsedRobots>>>>,

    /// domain -> next allowed request time
    domains: Mutex<HashMap<String, DomainSlot>>,
}

impl PolitenessGate {
    /// Creates a gate for one crawl
    ///
    /// # Arguments
    ///
    /// * `delay` - Configured minimum interval between same-domain requests
    /// * `user_agent` - Agent string checked against robots rules
    /// * `client` - HTTP client used for robots.txt fetches
    pub fn new(delay: Duration, user_agent: String, client: Client) -> Self {
        Self {
            delay,
            user_agent,
            client,
            robots: Mutex::new(HashMap::new()),
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether robots rules permit fetching this URL
    ///
    /// The first call for an origin fetches and caches `<origin>/robots.txt`;
    /// every later call for that origin is a pure cache read. A robots fetch
    /// that fails for any reason caches the permissive sentinel; robots
    /// problems never block crawling.
    pub async fn can_fetch(&self, url: &Url) -> bool {
        let Some(origin) = origin_of(url) else {
            return false;
        };

        let robots = self.robots_for(&origin).await;
        robots.is_allowed(url.as_str(), &self.user_agent)
    }

    /// Waits until a request to this URL's domain is allowed to start
    ///
    /// Reserves the next free slot for the domain and sleeps until it
    /// arrives. Returns immediately when the domain has no recent request.
    pub async fn wait_for_domain(&self, url: &Url) {
        let wait = self.reserve_slot(url);
        if !wait.is_zero() {
            tracing::debug!(
                "Waiting {:?} before fetching from {}",
                wait,
                extract_domain(url).unwrap_or_default()
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Atomically reserves the next request slot for a URL's domain
    ///
    /// Returns how long the caller must sleep before starting its request.
    /// The reservation itself happens under the domain lock, so concurrent
    /// callers for one domain receive start times spaced by the effective
    /// delay even though they sleep outside the lock.
    pub fn reserve_slot(&self, url: &Url) -> Duration {
        let Some(domain) = extract_domain(url) else {
            return Duration::ZERO;
        };

        let delay = self.effective_delay(url);
        let now = Instant::now();

        let mut domains = self.domains.lock().unwrap();
        let slot = domains
            .entry(domain)
            .or_insert(DomainSlot { next_allowed: now });

        let start = slot.next_allowed.max(now);
        slot.next_allowed = start + delay;

        start.saturating_duration_since(now)
    }

    /// Effective delay for a URL's domain: the configured delay or the
    /// origin's robots `Crawl-delay`, whichever is larger
    ///
    /// Only consults the robots cache: `can_fetch` has already populated it
    /// by the time a slot is reserved, and an unpopulated origin simply uses
    /// the configured delay.
    fn effective_delay(&self, url: &Url) -> Duration {
        let robots_delay = origin_of(url)
            .and_then(|origin| {
                let robots = self.robots.lock().unwrap();
                robots.get(&origin).and_then(|cell| cell.get().cloned())
            })
            .and_then(|robots| robots.crawl_delay(&self.user_agent))
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);

        self.delay.max(robots_delay)
    }

    /// Returns the robots rules for an origin, fetching them at most once
    async fn robots_for(&self, origin: &str) -> ParsedRobots {
        let cell = {
            let mut robots = self.robots.lock().unwrap();
            robots
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| self.fetch_robots(origin)).await.clone()
    }

    /// Fetches `<origin>/robots.txt`; any failure yields the permissive sentinel
    async fn fetch_robots(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("Fetching robots.txt: {}", robots_url);

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => ParsedRobots::from_content(&body),
                Err(e) => {
                    tracing::debug!("Failed to read robots.txt body from {}: {}", origin, e);
                    ParsedRobots::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "robots.txt for {} returned HTTP {}, treating as no restrictions",
                    origin,
                    response.status()
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::debug!(
                    "Failed to fetch robots.txt for {}: {}, treating as no restrictions",
                    origin,
                    e
                );
                ParsedRobots::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate(delay_ms: u64) -> PolitenessGate {
        PolitenessGate::new(
            Duration::from_millis(delay_ms),
            "TestBot/1.0".to_string(),
            Client::new(),
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_reservation_is_immediate() {
        let gate = gate(1000);
        let wait = gate.reserve_slot(&url("https://a.test/page"));
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_are_spaced_by_delay() {
        let gate = gate(1000);
        let u = url("https://a.test/page");

        // Three back-to-back reservations with no time passing: slots must
        // stack at exactly delay intervals.
        assert_eq!(gate.reserve_slot(&u), Duration::ZERO);
        assert_eq!(gate.reserve_slot(&u), Duration::from_millis(1000));
        assert_eq!(gate.reserve_slot(&u), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_consumes_wait() {
        let gate = gate(1000);
        let u = url("https://a.test/page");

        gate.reserve_slot(&u);
        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(gate.reserve_slot(&u), Duration::from_millis(600));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(gate.reserve_slot(&u), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_do_not_interfere() {
        let gate = gate(1000);

        assert_eq!(gate.reserve_slot(&url("https://a.test/")), Duration::ZERO);
        assert_eq!(gate.reserve_slot(&url("https://b.test/")), Duration::ZERO);
        assert_eq!(
            gate.reserve_slot(&url("https://a.test/x")),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_can_fetch_respects_disallow() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
            )
            .expect(1) // cache must coalesce to exactly one fetch
            .mount(&server)
            .await;

        let gate = gate(0);
        let base = server.uri();

        assert!(gate.can_fetch(&url(&format!("{}/public", base))).await);
        assert!(!gate.can_fetch(&url(&format!("{}/private/x", base))).await);
        // Second lookup for the same origin is a cache read
        assert!(!gate.can_fetch(&url(&format!("{}/private/y", base))).await);
    }

    #[tokio::test]
    async fn test_robots_fetch_failure_is_permissive() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gate = gate(0);
        assert!(
            gate.can_fetch(&url(&format!("{}/anything", server.uri())))
                .await
        );
    }

    #[tokio::test]
    async fn test_robots_404_is_permissive() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gate = gate(0);
        assert!(gate.can_fetch(&url(&format!("{}/page", server.uri()))).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_delay_extends_configured_delay() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2"),
            )
            .mount(&server)
            .await;

        let gate = gate(100);
        let page = url(&format!("{}/page", server.uri()));

        // Populate the robots cache, then reserve twice
        assert!(gate.can_fetch(&page).await);
        gate.reserve_slot(&page);
        let wait = gate.reserve_slot(&page);
        assert_eq!(wait, Duration::from_secs(2));
    }
}
