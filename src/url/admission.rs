//! URL admission policy
//!
//! Decides whether a discovered link is eligible for the frontier. A URL is
//! admitted only if its scheme is HTTP(S), its host matches the allowed-domain
//! list when one is configured, its path does not end in a known non-HTML file
//! extension, and its query string carries none of the parameter names
//! associated with search or dynamic endpoints.

use url::Url;

/// Media file extensions that never contain crawlable HTML
const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".mp3", ".mp4", ".avi", ".mov",
    ".wmv", ".flv", ".mkv", ".wav", ".flac", ".ogg", ".m4a", ".aac",
];

/// Document file extensions
const DOC_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".rtf", ".odt", ".ods", ".odp",
];

/// Archive file extensions
const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".rar", ".tar", ".gz", ".7z", ".bz2", ".xz"];

/// Code and data file extensions
const CODE_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".json", ".xml", ".ico", ".woff", ".woff2", ".ttf", ".eot", ".map", ".min.js",
    ".min.css",
];

/// Query parameter names that mark search or dynamic endpoints
const DYNAMIC_QUERY_PARAMS: &[&str] = &[
    "search", "q", "query", "id", "page", "offset", "limit", "sort", "filter", "ajax", "json",
    "xml", "api",
];

/// The reason a URL was rejected by the admission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionVerdict {
    /// URL may enter the frontier
    Admitted,
    /// Scheme is not HTTP or HTTPS
    BadScheme,
    /// Host does not match the configured allowed-domain list
    DomainNotAllowed,
    /// Path ends in a known non-HTML file extension
    BlockedExtension,
    /// Query string names a search/dynamic endpoint parameter
    DynamicQuery,
}

impl AdmissionVerdict {
    /// Returns true if the URL passed every admission check
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Checks a URL against the admission policy
///
/// `allowed_domains` of `None` means every domain is allowed. When a list is
/// configured, a host matches an entry either exactly or as a subdomain
/// (`blog.example.com` matches the entry `example.com`).
///
/// The URL is expected to be already normalized; the checks here are
/// case-insensitive on the path regardless.
pub fn is_admissible(url: &Url, allowed_domains: Option<&[String]>) -> AdmissionVerdict {
    if url.scheme() != "http" && url.scheme() != "https" {
        return AdmissionVerdict::BadScheme;
    }

    if let Some(allowed) = allowed_domains {
        let domain = match url.host_str() {
            Some(h) => h.to_lowercase(),
            None => return AdmissionVerdict::DomainNotAllowed,
        };
        if !allowed.iter().any(|a| domain_matches(&domain, a)) {
            return AdmissionVerdict::DomainNotAllowed;
        }
    }

    let path_lower = url.path().to_lowercase();
    if blocked_extension(&path_lower) {
        return AdmissionVerdict::BlockedExtension;
    }

    if let Some(query) = url.query() {
        if has_dynamic_params(query) {
            return AdmissionVerdict::DynamicQuery;
        }
    }

    AdmissionVerdict::Admitted
}

/// Checks if a domain matches an allowed entry exactly or as a subdomain
fn domain_matches(domain: &str, allowed: &str) -> bool {
    let allowed = allowed.to_lowercase();
    domain == allowed || domain.ends_with(&format!(".{}", allowed))
}

/// Checks if a lowercased path ends in any blocked extension
fn blocked_extension(path_lower: &str) -> bool {
    MEDIA_EXTENSIONS
        .iter()
        .chain(DOC_EXTENSIONS)
        .chain(ARCHIVE_EXTENSIONS)
        .chain(CODE_EXTENSIONS)
        .any(|ext| path_lower.ends_with(ext))
}

/// Checks if a query string names any dynamic/search parameter
///
/// Matches on parameter names, not values, so `?q=rust` is rejected while
/// `?lang=en` is not.
fn has_dynamic_params(query: &str) -> bool {
    query.split('&').any(|pair| {
        let name = pair.split('=').next().unwrap_or("").to_lowercase();
        DYNAMIC_QUERY_PARAMS.contains(&name.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(url: &str, allowed: Option<&[String]>) -> AdmissionVerdict {
        is_admissible(&Url::parse(url).unwrap(), allowed)
    }

    #[test]
    fn test_plain_page_admitted() {
        assert!(check("https://example.com/about", None).is_admitted());
        assert!(check("http://example.com/", None).is_admitted());
    }

    #[test]
    fn test_bad_scheme_rejected() {
        assert_eq!(
            check("ftp://example.com/file", None),
            AdmissionVerdict::BadScheme
        );
    }

    #[test]
    fn test_allowed_domain_exact_match() {
        let allowed = vec!["example.com".to_string()];
        assert!(check("https://example.com/page", Some(&allowed)).is_admitted());
    }

    #[test]
    fn test_allowed_domain_subdomain_match() {
        let allowed = vec!["example.com".to_string()];
        assert!(check("https://blog.example.com/post", Some(&allowed)).is_admitted());
        assert!(check("https://deep.sub.example.com/x", Some(&allowed)).is_admitted());
    }

    #[test]
    fn test_domain_not_allowed() {
        let allowed = vec!["example.com".to_string()];
        assert_eq!(
            check("https://other.com/page", Some(&allowed)),
            AdmissionVerdict::DomainNotAllowed
        );
        // Suffix without the dot boundary must not match
        assert_eq!(
            check("https://notexample.com/page", Some(&allowed)),
            AdmissionVerdict::DomainNotAllowed
        );
    }

    #[test]
    fn test_media_extension_rejected() {
        assert_eq!(
            check("https://example.com/photo.jpg", None),
            AdmissionVerdict::BlockedExtension
        );
        assert_eq!(
            check("https://example.com/video.MP4", None),
            AdmissionVerdict::BlockedExtension
        );
    }

    #[test]
    fn test_document_extension_rejected() {
        assert_eq!(
            check("https://example.com/report.pdf", None),
            AdmissionVerdict::BlockedExtension
        );
    }

    #[test]
    fn test_archive_extension_rejected() {
        assert_eq!(
            check("https://example.com/bundle.tar", None),
            AdmissionVerdict::BlockedExtension
        );
    }

    #[test]
    fn test_code_extension_rejected() {
        assert_eq!(
            check("https://example.com/app.min.js", None),
            AdmissionVerdict::BlockedExtension
        );
        assert_eq!(
            check("https://example.com/styles.css", None),
            AdmissionVerdict::BlockedExtension
        );
    }

    #[test]
    fn test_html_extension_admitted() {
        assert!(check("https://example.com/page.html", None).is_admitted());
    }

    #[test]
    fn test_dynamic_query_rejected() {
        assert_eq!(
            check("https://example.com/find?q=rust", None),
            AdmissionVerdict::DynamicQuery
        );
        assert_eq!(
            check("https://example.com/list?page=2", None),
            AdmissionVerdict::DynamicQuery
        );
        assert_eq!(
            check("https://example.com/api?API=v1", None),
            AdmissionVerdict::DynamicQuery
        );
    }

    #[test]
    fn test_benign_query_admitted() {
        assert!(check("https://example.com/page?lang=en", None).is_admitted());
    }

    #[test]
    fn test_param_name_not_value_is_matched() {
        // "id" appearing only as a value must not trigger the filter
        assert!(check("https://example.com/page?kind=id", None).is_admitted());
    }
}
