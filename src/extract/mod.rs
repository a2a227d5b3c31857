//! Content extraction collaborator
//!
//! The crawl engine treats extraction as an opaque, possibly-failing call:
//! it hands over the HTML body and page URL, gets back a [`PageRecord`] or
//! an error, and degrades to "no extracted data" on failure without
//! interrupting the fetch loop.

mod html;

pub use html::HtmlExtractor;

use crate::CrawlError;
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LinkInfo {
    pub url: String,
    pub text: String,
    pub title: String,
}

/// An image found on a page
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageInfo {
    pub url: String,
    pub alt: String,
    pub title: String,
    pub width: String,
    pub height: String,
}

/// Structured data extracted from one page
///
/// Link and image lists are bounded (50 links per direction, 20 images) and
/// the cleaned text is truncated to 5000 characters, so a record stays small
/// no matter what the page looked like.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub extracted_at: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub language: String,
    pub author: String,
    pub publication_date: Option<String>,

    pub word_count: usize,
    pub paragraph_count: usize,
    pub heading_structure: BTreeMap<String, Vec<String>>,
    pub text_content: String,

    pub internal_links: Vec<LinkInfo>,
    pub external_links: Vec<LinkInfo>,
    pub images: Vec<ImageInfo>,
    pub social_media_links: Vec<String>,

    pub page_size_bytes: usize,
    pub meta_tags: BTreeMap<String, String>,
    pub structured_data: Vec<serde_json::Value>,
    pub content_sections: BTreeMap<String, usize>,
}

impl PageRecord {
    /// Every discovered link, internal then external, for frontier feeding
    pub fn all_links(&self) -> impl Iterator<Item = &LinkInfo> {
        self.internal_links.iter().chain(self.external_links.iter())
    }
}

/// Extraction collaborator interface
///
/// The engine only depends on this trait; swapping the extractor never
/// touches the crawl loop.
pub trait Extractor: Send + Sync {
    /// Extracts structured data from a fetched HTML body
    fn extract(&self, html: &str, page_url: &Url) -> Result<PageRecord, CrawlError>;
}
