use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pagehaul::url::extract_domain;
///
/// let url = Url::parse("https://Sub.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the origin of a URL: scheme + host (+ port when non-default)
///
/// The origin is the unit robots.txt rules apply to; `/robots.txt` is
/// resolved relative to it.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pagehaul::url::origin_of;
///
/// let url = Url::parse("https://example.com/deep/path?q=1").unwrap();
/// assert_eq!(origin_of(&url), Some("https://example.com".to_string()));
///
/// let url = Url::parse("http://example.com:8080/x").unwrap();
/// assert_eq!(origin_of(&url), Some("http://example.com:8080".to_string()));
/// ```
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://EXAMPLE.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        // Port is not part of the domain
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_origin_default_port() {
        let url = Url::parse("https://example.com/path/to/page?query=value").unwrap();
        assert_eq!(origin_of(&url), Some("https://example.com".to_string()));
    }

    #[test]
    fn test_origin_explicit_port() {
        let url = Url::parse("http://127.0.0.1:4567/page").unwrap();
        assert_eq!(origin_of(&url), Some("http://127.0.0.1:4567".to_string()));
    }

    #[test]
    fn test_origin_distinguishes_scheme() {
        let http = Url::parse("http://example.com/").unwrap();
        let https = Url::parse("https://example.com/").unwrap();
        assert_ne!(origin_of(&http), origin_of(&https));
    }
}
