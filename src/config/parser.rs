use crate::config::types::{CrawlJob, FileConfig, MAX_WORKERS, MIN_WORKERS};
use crate::config::validation::validate;
use crate::url::{is_admissible, normalize_url};
use crate::{ConfigError, CrawlError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default values used when neither the config file nor the CLI supplies one
const DEFAULT_MAX_DEPTH: u32 = 2;
const DEFAULT_DELAY_SECS: f64 = 1.0;
const DEFAULT_MAX_PAGES: u32 = 50;
const DEFAULT_WORKERS: usize = 3;
const DEFAULT_OUTPUT_DIR: &str = "downloaded_pages";
const DEFAULT_USER_AGENT: &str = "PagehaulBot/1.0";

/// Per-field overrides collected from the command line
///
/// A `None` field means "not given on the command line", so the config file
/// value (or the hard-coded default) applies.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub max_depth: Option<u32>,
    pub delay: Option<f64>,
    pub max_pages: Option<u32>,
    pub workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub allowed_domains: Option<Vec<String>>,
    pub user_agent: Option<String>,
    pub database: Option<bool>,
}

/// Loads and parses a YAML defaults file from the given path
///
/// # Arguments
///
/// * `path` - Path to the YAML configuration file
///
/// # Returns
///
/// * `Ok(FileConfig)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to read or parse the file
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded on the session row so an interrupted session can be
/// checked against the configuration it was started with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Resolves a complete crawl job from the seed URL, file defaults, and CLI overrides
///
/// Precedence per field: CLI override, then config file, then built-in default.
/// The seed URL is normalized and checked against the admission policy here;
/// a seed that fails is fatal, unlike any per-URL failure during the crawl.
///
/// # Arguments
///
/// * `seed` - The seed URL string from the command line
/// * `file` - Parsed defaults file (use `FileConfig::default()` when absent)
/// * `overrides` - CLI flag values
/// * `config_hash` - Hash of the defaults file, if one was loaded
///
/// # Returns
///
/// * `Ok(CrawlJob)` - A validated, immutable job
/// * `Err(CrawlError)` - Invalid seed or invalid configuration
pub fn build_job(
    seed: &str,
    file: &FileConfig,
    overrides: &JobOverrides,
    config_hash: Option<String>,
) -> Result<CrawlJob, CrawlError> {
    let allowed_domains = overrides
        .allowed_domains
        .clone()
        .or_else(|| file.filters.allowed_domains.clone())
        .filter(|domains| !domains.is_empty());

    let seed_url = normalize_url(seed).map_err(|e| CrawlError::InvalidSeed {
        url: seed.to_string(),
        reason: e.to_string(),
    })?;

    let verdict = is_admissible(&seed_url, allowed_domains.as_deref());
    if !verdict.is_admitted() {
        return Err(CrawlError::InvalidSeed {
            url: seed.to_string(),
            reason: format!("rejected by admission policy: {:?}", verdict),
        });
    }

    let requested_workers = overrides
        .workers
        .or(file.crawler.workers)
        .unwrap_or(DEFAULT_WORKERS);
    let max_workers = requested_workers.clamp(MIN_WORKERS, MAX_WORKERS);
    if max_workers != requested_workers {
        tracing::warn!(
            "Requested {} workers, clamped to {}",
            requested_workers,
            max_workers
        );
    }

    let delay_secs = overrides
        .delay
        .or(file.crawler.delay)
        .unwrap_or(DEFAULT_DELAY_SECS);

    let job = CrawlJob {
        seed_url,
        max_depth: overrides
            .max_depth
            .or(file.crawler.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH),
        delay: Duration::from_secs_f64(delay_secs.max(0.0)),
        max_pages: overrides
            .max_pages
            .or(file.crawler.max_pages)
            .unwrap_or(DEFAULT_MAX_PAGES),
        max_workers,
        allowed_domains,
        user_agent: overrides
            .user_agent
            .clone()
            .or_else(|| file.crawler.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        output_dir: overrides
            .output_dir
            .clone()
            .or_else(|| file.output.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        database_enabled: overrides.database.or(file.output.database).unwrap_or(true),
        config_hash,
    };

    validate(&job)?;

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
crawler:
  max_depth: 3
  delay: 0.5
  max_pages: 25
  user_agent: "TestBot/1.0"
  workers: 4

output:
  directory: "./pages"
  database: false

filters:
  allowed_domains:
    - example.com
"#;
        let file = create_temp_config(config_content);
        let config = load_file_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, Some(3));
        assert_eq!(config.crawler.delay, Some(0.5));
        assert_eq!(config.crawler.workers, Some(4));
        assert_eq!(config.output.database, Some(false));
        assert_eq!(
            config.filters.allowed_domains,
            Some(vec!["example.com".to_string()])
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_file_config(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_yaml() {
        let file = create_temp_config("crawler: [not: a: mapping");
        let result = load_file_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let file = create_temp_config("");
        let config = load_file_config(file.path()).unwrap();
        assert!(config.crawler.max_depth.is_none());
    }

    #[test]
    fn test_build_job_defaults() {
        let job = build_job(
            "https://example.com/",
            &FileConfig::default(),
            &JobOverrides::default(),
            None,
        )
        .unwrap();

        assert_eq!(job.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(job.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(job.max_workers, DEFAULT_WORKERS);
        assert_eq!(job.delay, Duration::from_secs_f64(DEFAULT_DELAY_SECS));
        assert!(job.database_enabled);
        assert!(job.allowed_domains.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file_config = FileConfig {
            crawler: crate::config::types::CrawlerSection {
                max_depth: Some(5),
                delay: Some(2.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let overrides = JobOverrides {
            max_depth: Some(1),
            ..Default::default()
        };

        let job = build_job("https://example.com/", &file_config, &overrides, None).unwrap();

        // CLI wins over file; file wins over default
        assert_eq!(job.max_depth, 1);
        assert_eq!(job.delay, Duration::from_secs_f64(2.0));
    }

    #[test]
    fn test_workers_clamped() {
        let overrides = JobOverrides {
            workers: Some(50),
            ..Default::default()
        };
        let job = build_job(
            "https://example.com/",
            &FileConfig::default(),
            &overrides,
            None,
        )
        .unwrap();
        assert_eq!(job.max_workers, MAX_WORKERS);

        let overrides = JobOverrides {
            workers: Some(0),
            ..Default::default()
        };
        let job = build_job(
            "https://example.com/",
            &FileConfig::default(),
            &overrides,
            None,
        )
        .unwrap();
        assert_eq!(job.max_workers, MIN_WORKERS);
    }

    #[test]
    fn test_invalid_seed_is_fatal() {
        let result = build_job(
            "not a url",
            &FileConfig::default(),
            &JobOverrides::default(),
            None,
        );
        assert!(matches!(result, Err(CrawlError::InvalidSeed { .. })));

        let result = build_job(
            "ftp://example.com/",
            &FileConfig::default(),
            &JobOverrides::default(),
            None,
        );
        assert!(matches!(result, Err(CrawlError::InvalidSeed { .. })));
    }

    #[test]
    fn test_seed_outside_allowed_domains_is_fatal() {
        let overrides = JobOverrides {
            allowed_domains: Some(vec!["example.com".to_string()]),
            ..Default::default()
        };
        let result = build_job(
            "https://other.org/",
            &FileConfig::default(),
            &overrides,
            None,
        );
        assert!(matches!(result, Err(CrawlError::InvalidSeed { .. })));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
