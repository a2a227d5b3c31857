//! HTTP fetcher
//!
//! Builds the shared HTTP client and performs single-page fetches with
//! timeouts, automatic redirect following, retry with exponential backoff,
//! and classification of every outcome into accepted HTML, skip, or failure.

use crate::stats::{ErrorKind, SkipReason};
use chrono::{DateTime, Utc};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Total attempts for one URL, including the first
const MAX_ATTEMPTS: u32 = 3;

/// Transient statuses worth retrying
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Base for exponential backoff between attempts
const BACKOFF_BASE: Duration = Duration::from_millis(500);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// A successfully downloaded page, minus the body
///
/// Consumed by persistence and statistics; the body travels alongside it in
/// [`FetchOutcome::Html`] so storage rows never hold page content.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// The URL as requested (the crawl identity of the page)
    pub url: Url,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value
    pub content_type: String,

    /// Body length in bytes
    pub byte_length: u64,

    /// Wall time spent fetching, including retries and backoff
    pub response_time: Duration,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Classified result of a fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// Accepted: a successful response carrying HTML
    Html {
        page: PageResult,
        body: String,
    },

    /// Rejected without being an error: wrong status or non-HTML content
    Skipped {
        reason: SkipReason,
        status_code: Option<u16>,
        content_type: Option<String>,
    },

    /// Transport-level failure after the retry budget was spent
    Failed { kind: ErrorKind, message: String },
}

/// Builds the HTTP client shared by all workers and the robots fetcher
///
/// Connection pooling and reuse come from sharing this one client; redirects
/// are followed automatically up to the hop limit.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(READ_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the result
///
/// # Retry behavior
///
/// HTTP {429, 500, 502, 503, 504} and timeouts are retried with exponential
/// backoff up to 3 attempts total. Everything else resolves immediately:
/// other non-success statuses and non-HTML bodies are skips, connection and
/// redirect failures are errors of their respective kinds.
pub async fn fetch_url(client: &Client, url: &Url) -> FetchOutcome {
    let started = Instant::now();
    let mut last_failure: Option<(ErrorKind, String)> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            let backoff = BACKOFF_BASE * 2u32.pow(attempt - 2);
            tracing::debug!(
                "Retrying {} (attempt {}/{}) after {:?}",
                url,
                attempt,
                MAX_ATTEMPTS,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();

                if RETRY_STATUSES.contains(&status.as_u16()) && attempt < MAX_ATTEMPTS {
                    last_failure = Some((
                        ErrorKind::HttpError,
                        format!("HTTP {} from {}", status.as_u16(), url),
                    ));
                    continue;
                }

                if !status.is_success() {
                    return FetchOutcome::Skipped {
                        reason: SkipReason::HttpStatus,
                        status_code: Some(status.as_u16()),
                        content_type: None,
                    };
                }

                let content_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_lowercase();

                if !content_type.contains("text/html") {
                    return FetchOutcome::Skipped {
                        reason: SkipReason::NonHtml,
                        status_code: Some(status.as_u16()),
                        content_type: Some(content_type),
                    };
                }

                let final_url = response.url().clone();
                let status_code = status.as_u16();

                return match response.text().await {
                    Ok(body) => FetchOutcome::Html {
                        page: PageResult {
                            url: url.clone(),
                            final_url,
                            status_code,
                            content_type,
                            byte_length: body.len() as u64,
                            response_time: started.elapsed(),
                            fetched_at: Utc::now(),
                        },
                        body,
                    },
                    Err(e) => FetchOutcome::Failed {
                        kind: ErrorKind::Other,
                        message: format!("Failed to read body: {}", e),
                    },
                };
            }

            Err(e) => {
                let (kind, message) = classify_error(&e);
                match kind {
                    // Timeouts are transient; spend the retry budget on them
                    ErrorKind::Timeout if attempt < MAX_ATTEMPTS => {
                        last_failure = Some((kind, message));
                        continue;
                    }
                    _ => return FetchOutcome::Failed { kind, message },
                }
            }
        }
    }

    // Retry budget exhausted on a transient condition
    let (kind, message) =
        last_failure.unwrap_or((ErrorKind::Other, "Retry budget exhausted".to_string()));
    FetchOutcome::Failed { kind, message }
}

/// Maps a reqwest error to the statistics taxonomy
fn classify_error(e: &reqwest::Error) -> (ErrorKind, String) {
    if e.is_timeout() {
        (ErrorKind::Timeout, format!("Request timeout: {}", e))
    } else if e.is_redirect() {
        (
            ErrorKind::TooManyRedirects,
            format!("Redirect limit exceeded: {}", e),
        )
    } else if e.is_connect() {
        (ErrorKind::Connection, format!("Connection error: {}", e))
    } else if e.is_request() || e.is_body() || e.is_decode() {
        (ErrorKind::HttpError, format!("Request error: {}", e))
    } else {
        (ErrorKind::Other, e.to_string())
    }
}
