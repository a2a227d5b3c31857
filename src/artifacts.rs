//! Per-page file artifacts
//!
//! For every successfully fetched page three files land under
//! `<output_dir>/<domain>/`: the raw HTML, a JSON sidecar with the extracted
//! data, and a small `.meta` sidecar describing the fetch. Filenames are
//! derived from the URL path, with `index.html` for the root and a numeric
//! suffix on collision.

use crate::crawler::PageResult;
use crate::extract::PageRecord;
use crate::url::extract_domain;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Characters that cannot appear in filenames across platforms
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Writes page artifacts into a per-domain directory layout
pub struct PageWriter {
    output_dir: PathBuf,
}

impl PageWriter {
    /// Creates a writer rooted at `output_dir`, creating the directory
    pub fn new(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Writes the HTML/JSON/meta triple for one page
    ///
    /// Returns the path of the HTML file. `record` may be None when
    /// extraction failed; the page is still saved, just without a JSON
    /// sidecar.
    pub fn write_page(
        &self,
        page: &PageResult,
        body: &str,
        record: Option<&PageRecord>,
    ) -> std::io::Result<PathBuf> {
        let domain = extract_domain(&page.url).unwrap_or_else(|| "unknown".to_string());
        let domain_dir = self.output_dir.join(&domain);
        std::fs::create_dir_all(&domain_dir)?;

        let filepath = unique_path(&domain_dir, &filename_for(&page.url));
        std::fs::write(&filepath, body)?;

        if let Some(record) = record {
            let json_path = filepath.with_extension("json");
            let json = serde_json::to_string_pretty(record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(json_path, json)?;
        }

        let meta_path = filepath.with_extension("meta");
        let mut meta = std::fs::File::create(meta_path)?;
        writeln!(meta, "URL: {}", page.url)?;
        writeln!(meta, "Status Code: {}", page.status_code)?;
        writeln!(meta, "Content-Type: {}", page.content_type)?;
        writeln!(meta, "Content-Length: {}", page.byte_length)?;
        writeln!(
            meta,
            "Downloaded: {}",
            page.fetched_at.format("%Y-%m-%d %H:%M:%S")
        )?;

        Ok(filepath)
    }
}

/// Derives an HTML filename from a URL path
fn filename_for(url: &url::Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "index.html".to_string();
    }

    let mut name: String = path
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();

    if !name.ends_with(".html") {
        name.push_str(".html");
    }
    name
}

/// Resolves filename collisions with a numeric suffix
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let stem = candidate
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page")
        .to_string();
    let ext = candidate
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("html")
        .to_string();

    let mut counter = 1;
    loop {
        let next = dir.join(format!("{}_{}.{}", stem, counter, ext));
        if !next.exists() {
            return next;
        }
        counter += 1;
    }
}
