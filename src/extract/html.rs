//! HTML extractor implementation
//!
//! Pulls structured data out of a fetched page: document metadata, content
//! measurements, bounded link/image inventories, and counts of semantic
//! sections driven by a configurable selector table.

use crate::extract::{Extractor, ImageInfo, LinkInfo, PageRecord};
use crate::CrawlError;
use chrono::Utc;
use ego_tree::NodeRef;
use scraper::{Html, Node, Selector};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Cap on links kept per direction (internal/external)
const MAX_LINKS: usize = 50;

/// Cap on images kept per page
const MAX_IMAGES: usize = 20;

/// Cap on cleaned text length in characters
const MAX_TEXT_CHARS: usize = 5000;

/// Cap on the first-paragraph description fallback
const MAX_DESCRIPTION_CHARS: usize = 200;

/// Hosts that mark a link as social media
const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "github.com",
];

/// One row of the semantic-section table: a name and the ordered selectors
/// whose match counts are summed under it
#[derive(Debug, Clone)]
pub struct SectionRule {
    pub name: String,
    pub selectors: Vec<String>,
}

/// Extractor backed by the scraper crate
pub struct HtmlExtractor {
    sections: Vec<SectionRule>,
}

impl HtmlExtractor {
    /// Creates an extractor with a custom section table
    pub fn with_sections(sections: Vec<SectionRule>) -> Self {
        Self { sections }
    }
}

impl Default for HtmlExtractor {
    /// The default semantic-section table
    fn default() -> Self {
        let rule = |name: &str, selectors: &[&str]| SectionRule {
            name: name.to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            sections: vec![
                rule(
                    "article",
                    &["article", ".article", ".post", ".content", ".main-content"],
                ),
                rule("navigation", &["nav", ".nav", ".navigation", ".menu"]),
                rule("sidebar", &[".sidebar", ".aside", "aside"]),
                rule("footer", &["footer", ".footer"]),
                rule("header", &["header", ".header"]),
            ],
        }
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<PageRecord, CrawlError> {
        if html.trim().is_empty() {
            return Err(CrawlError::Extraction {
                url: page_url.to_string(),
                message: "empty document".to_string(),
            });
        }

        let document = Html::parse_document(html);
        let (internal_links, external_links) = extract_links(&document, page_url);

        Ok(PageRecord {
            url: page_url.to_string(),
            extracted_at: Utc::now().to_rfc3339(),
            title: extract_title(&document),
            description: extract_description(&document),
            keywords: extract_keywords(&document),
            language: extract_language(&document),
            author: extract_author(&document),
            publication_date: extract_publication_date(&document),
            word_count: count_words(&document),
            paragraph_count: count_matches(&document, "p"),
            heading_structure: extract_headings(&document),
            text_content: extract_clean_text(&document),
            internal_links,
            external_links,
            images: extract_images(&document, page_url),
            social_media_links: extract_social_links(&document),
            page_size_bytes: html.len(),
            meta_tags: extract_meta_tags(&document),
            structured_data: extract_structured_data(&document),
            content_sections: self.count_sections(&document),
        })
    }
}

impl HtmlExtractor {
    /// Sums match counts per semantic section rule
    fn count_sections(&self, document: &Html) -> BTreeMap<String, usize> {
        self.sections
            .iter()
            .map(|rule| {
                let count = rule
                    .selectors
                    .iter()
                    .map(|s| count_matches(document, s))
                    .sum();
                (rule.name.clone(), count)
            })
            .collect()
    }
}

fn sel(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

fn count_matches(document: &Html, selector: &str) -> usize {
    sel(selector)
        .map(|s| document.select(&s).count())
        .unwrap_or(0)
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let s = sel(selector)?;
    document
        .select(&s)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let s = sel(selector)?;
    document
        .select(&s)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Title tag, falling back to the first h1
fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_else(|| "No title found".to_string())
}

/// Meta description, Open Graph description, or a truncated first paragraph
fn extract_description(document: &Html) -> String {
    if let Some(desc) = meta_content(document, r#"meta[name="description"]"#) {
        return desc;
    }
    if let Some(desc) = meta_content(document, r#"meta[property="og:description"]"#) {
        return desc;
    }
    if let Some(text) = first_text(document, "p") {
        return truncate_chars(&text, MAX_DESCRIPTION_CHARS);
    }
    "No description found".to_string()
}

fn extract_keywords(document: &Html) -> Vec<String> {
    meta_content(document, r#"meta[name="keywords"]"#)
        .map(|content| {
            content
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_language(document: &Html) -> String {
    sel("html")
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("lang"))
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn extract_author(document: &Html) -> String {
    if let Some(author) = meta_content(document, r#"meta[name="author"]"#) {
        return author;
    }
    for selector in [".author", ".byline", r#"[rel="author"]"#, ".writer"] {
        if let Some(author) = first_text(document, selector) {
            return author;
        }
    }
    "Unknown".to_string()
}

fn extract_publication_date(document: &Html) -> Option<String> {
    let candidates = [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="date"]"#,
        r#"meta[name="publish-date"]"#,
        "time[datetime]",
        ".date",
        ".publish-date",
    ];

    for selector in candidates {
        let Some(s) = sel(selector) else { continue };
        if let Some(el) = document.select(&s).next() {
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
                .map(|v| v.to_string())
                .unwrap_or_else(|| el.text().collect::<String>());
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Collects descendant text, skipping the named elements entirely
fn collect_text(node: NodeRef<Node>, skip: &[&str], out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text);
                out.push(' ');
            }
            Node::Element(element) => {
                if !skip.contains(&element.name()) {
                    collect_text(child, skip, out);
                }
            }
            _ => {}
        }
    }
}

/// Word count over the whole document, excluding script and style content
fn count_words(document: &Html) -> usize {
    let mut text = String::new();
    collect_text(document.tree.root(), &["script", "style"], &mut text);
    text.split_whitespace().count()
}

fn extract_headings(document: &Html) -> BTreeMap<String, Vec<String>> {
    let mut headings = BTreeMap::new();
    for level in 1..=6 {
        let tag = format!("h{}", level);
        let Some(s) = sel(&tag) else { continue };
        let texts: Vec<String> = document
            .select(&s)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !texts.is_empty() {
            headings.insert(tag, texts);
        }
    }
    headings
}

/// Cleaned main-content text: prefers a main/article/content container over
/// the whole body, strips chrome elements, collapses whitespace, truncates
fn extract_clean_text(document: &Html) -> String {
    let container = ["main", "article", "#content", ".content", "body"]
        .iter()
        .filter_map(|selector| sel(selector))
        .find_map(|s| document.select(&s).next());

    let mut raw = String::new();
    let skip = ["script", "style", "nav", "footer"];
    match container {
        Some(el) => collect_text(*el, &skip, &mut raw),
        None => collect_text(document.tree.root(), &skip, &mut raw),
    }

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_TEXT_CHARS)
}

/// Extracts links and splits them into internal/external, each capped
fn extract_links(document: &Html, base_url: &Url) -> (Vec<LinkInfo>, Vec<LinkInfo>) {
    let mut internal = Vec::new();
    let mut external = Vec::new();
    let base_host = base_url.host_str().unwrap_or("");

    let Some(s) = sel("a[href]") else {
        return (internal, external);
    };

    for el in document.select(&s) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        let link = LinkInfo {
            url: resolved.to_string(),
            text: el.text().collect::<String>().trim().to_string(),
            title: el.value().attr("title").unwrap_or("").to_string(),
        };

        let is_internal = resolved.host_str().map(|h| h == base_host).unwrap_or(true);
        let bucket = if is_internal {
            &mut internal
        } else {
            &mut external
        };
        if bucket.len() < MAX_LINKS {
            bucket.push(link);
        }
    }

    (internal, external)
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageInfo> {
    let Some(s) = sel("img[src]") else {
        return Vec::new();
    };

    document
        .select(&s)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            let resolved = base_url.join(src).ok()?;
            let attr = |name: &str| el.value().attr(name).unwrap_or("").to_string();
            Some(ImageInfo {
                url: resolved.to_string(),
                alt: attr("alt"),
                title: attr("title"),
                width: attr("width"),
                height: attr("height"),
            })
        })
        .take(MAX_IMAGES)
        .collect()
}

fn extract_social_links(document: &Html) -> Vec<String> {
    let Some(s) = sel("a[href]") else {
        return Vec::new();
    };

    let unique: BTreeSet<String> = document
        .select(&s)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| SOCIAL_DOMAINS.iter().any(|domain| href.contains(domain)))
        .map(|href| href.to_string())
        .collect();

    unique.into_iter().collect()
}

fn extract_meta_tags(document: &Html) -> BTreeMap<String, String> {
    let Some(s) = sel("meta") else {
        return BTreeMap::new();
    };

    document
        .select(&s)
        .filter_map(|el| {
            let name = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"))?;
            let content = el.value().attr("content")?;
            Some((name.to_string(), content.to_string()))
        })
        .collect()
}

fn extract_structured_data(document: &Html) -> Vec<serde_json::Value> {
    let Some(s) = sel(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    document
        .select(&s)
        .filter_map(|el| {
            let raw = el.text().collect::<String>();
            serde_json::from_str(&raw).ok()
        })
        .collect()
}

/// Truncates to a character budget, appending an ellipsis when cut
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}
