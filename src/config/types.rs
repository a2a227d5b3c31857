use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Workers are clamped to this range regardless of what was requested
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 10;

/// Shape of the YAML defaults file
///
/// Every section and field is optional; CLI flags override whatever the file
/// supplies, and hard-coded defaults fill the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub crawler: CrawlerSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub filters: FiltersSection,
}

/// `crawler:` section of the defaults file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlerSection {
    /// Maximum link-hops from the seed URL
    pub max_depth: Option<u32>,

    /// Minimum seconds between requests to the same domain
    pub delay: Option<f64>,

    /// Maximum number of pages to download
    pub max_pages: Option<u32>,

    /// User agent string sent with every request
    pub user_agent: Option<String>,

    /// Number of concurrent workers
    pub workers: Option<usize>,
}

/// `output:` section of the defaults file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSection {
    /// Directory for per-page artifacts
    pub directory: Option<PathBuf>,

    /// Whether to record sessions/pages/errors in the SQLite database
    pub database: Option<bool>,
}

/// `filters:` section of the defaults file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersSection {
    /// Domains eligible for crawling (exact or subdomain match); empty/absent
    /// means all domains are allowed
    pub allowed_domains: Option<Vec<String>>,
}

/// Resolved crawl configuration, immutable once the crawl starts
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// Normalized seed URL
    pub seed_url: Url,

    /// Maximum link-hops from the seed
    pub max_depth: u32,

    /// Minimum interval between requests to one domain
    pub delay: Duration,

    /// Hard cap on downloaded pages
    pub max_pages: u32,

    /// Worker count, already clamped to [MIN_WORKERS, MAX_WORKERS]
    pub max_workers: usize,

    /// Allowed-domain list; None means all domains
    pub allowed_domains: Option<Vec<String>>,

    /// User agent string
    pub user_agent: String,

    /// Directory for per-page artifacts
    pub output_dir: PathBuf,

    /// Whether session persistence is enabled
    pub database_enabled: bool,

    /// Hash of the defaults file this job was resolved from, if any
    pub config_hash: Option<String>,
}

impl CrawlJob {
    /// Allowed domains as a slice, for the admission policy
    pub fn allowed_domains(&self) -> Option<&[String]> {
        self.allowed_domains.as_deref()
    }

    /// Path of the SQLite database inside the output directory
    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join("crawler_data.db")
    }
}
