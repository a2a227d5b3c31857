use crate::config::types::{CrawlJob, MAX_WORKERS, MIN_WORKERS};
use crate::ConfigError;

/// Validates a resolved crawl job
///
/// Runs after precedence resolution, so every field already holds its final
/// value. Worker clamping happens during resolution; this pass only rejects
/// values no clamp can repair.
pub fn validate(job: &CrawlJob) -> Result<(), ConfigError> {
    if job.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            job.max_pages
        )));
    }

    if !(MIN_WORKERS..=MAX_WORKERS).contains(&job.max_workers) {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between {} and {}, got {}",
            MIN_WORKERS, MAX_WORKERS, job.max_workers
        )));
    }

    if job.delay.as_secs_f64() > 300.0 {
        return Err(ConfigError::Validation(format!(
            "delay must be <= 300 seconds, got {:.1}",
            job.delay.as_secs_f64()
        )));
    }

    validate_user_agent(&job.user_agent)?;

    if job.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if let Some(domains) = &job.allowed_domains {
        for domain in domains {
            validate_domain_string(domain)?;
        }
    }

    Ok(())
}

/// Validates the user agent string
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    // Header values must stay ASCII without control characters
    if !user_agent
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control())
    {
        return Err(ConfigError::Validation(format!(
            "user_agent must be printable ASCII, got '{}'",
            user_agent
        )));
    }

    Ok(())
}

/// Validates an allowed-domain entry
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::Validation(
            "allowed domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use url::Url;

    fn test_job() -> CrawlJob {
        CrawlJob {
            seed_url: Url::parse("https://example.com/").unwrap(),
            max_depth: 2,
            delay: Duration::from_secs(1),
            max_pages: 50,
            max_workers: 3,
            allowed_domains: None,
            user_agent: "TestBot/1.0".to_string(),
            output_dir: PathBuf::from("./pages"),
            database_enabled: true,
            config_hash: None,
        }
    }

    #[test]
    fn test_valid_job() {
        assert!(validate(&test_job()).is_ok());
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let mut job = test_job();
        job.max_pages = 0;
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_workers_out_of_range_rejected() {
        let mut job = test_job();
        job.max_workers = 0;
        assert!(validate(&job).is_err());

        job.max_workers = 11;
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_excessive_delay_rejected() {
        let mut job = test_job();
        job.delay = Duration::from_secs(301);
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let mut job = test_job();
        job.user_agent = String::new();
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_non_ascii_user_agent_rejected() {
        let mut job = test_job();
        job.user_agent = "Bot\u{1F980}".to_string();
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_bad_allowed_domain_rejected() {
        let mut job = test_job();
        job.allowed_domains = Some(vec![".example.com".to_string()]);
        assert!(validate(&job).is_err());

        job.allowed_domains = Some(vec!["exa mple.com".to_string()]);
        assert!(validate(&job).is_err());

        job.allowed_domains = Some(vec!["a..b".to_string()]);
        assert!(validate(&job).is_err());
    }

    #[test]
    fn test_good_allowed_domains_accepted() {
        let mut job = test_job();
        job.allowed_domains = Some(vec!["example.com".to_string(), "sub.other.org".to_string()]);
        assert!(validate(&job).is_ok());
    }
}
