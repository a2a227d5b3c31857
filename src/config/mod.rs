//! Configuration module for Pagehaul
//!
//! A YAML file supplies defaults, command-line flags override them, and the
//! result is resolved into an immutable [`CrawlJob`] before the crawl starts.
//!
//! # Example
//!
//! ```no_run
//! use pagehaul::config::{build_job, load_file_config, JobOverrides};
//! use std::path::Path;
//!
//! let file = load_file_config(Path::new("crawler_config.yaml")).unwrap();
//! let job = build_job("https://example.com/", &file, &JobOverrides::default(), None).unwrap();
//! println!("Crawling with {} workers", job.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlJob, CrawlerSection, FileConfig, FiltersSection, OutputSection, MAX_WORKERS, MIN_WORKERS,
};

// Re-export parser functions
pub use parser::{build_job, compute_config_hash, load_file_config, JobOverrides};
pub use validation::validate;
