use crate::UrlError;
use url::Url;

/// Normalizes a URL according to Pagehaul's normalization rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Validate the scheme (only HTTP and HTTPS are supported)
/// 3. Lowercase the host
/// 4. Remove the fragment (everything after #)
///
/// The path and query string are left untouched: two URLs that differ only
/// in path case are genuinely different resources. Normalization is
/// idempotent: normalizing twice yields the same URL as normalizing once.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use pagehaul::url::normalize_url;
///
/// let url = normalize_url("HTTPS://WWW.Example.COM/Page#section").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/Page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases the scheme during parsing; the host
    // still needs explicit lowering when it came in mixed-case.
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
        }
    } else {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_host() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_path_case_preserved() {
        let result = normalize_url("https://example.com/CaseSensitive/Path").unwrap();
        assert_eq!(result.as_str(), "https://example.com/CaseSensitive/Path");
    }

    #[test]
    fn test_query_preserved() {
        let result = normalize_url("https://example.com/page?a=1&b=2").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_http_scheme_kept() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        let result = normalize_url("not a url");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let result = normalize_url("  https://example.com/page  ").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "HTTP://Example.COM/Path?b=2&a=1#frag",
            "https://example.com/",
            "https://sub.example.com:8443/x",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(once.as_str()).unwrap();
            assert_eq!(once, twice, "Normalization not idempotent for {}", input);
        }
    }

    #[test]
    fn test_port_preserved() {
        let result = normalize_url("https://example.com:8080/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com:8080/page");
    }
}
