//! URL handling module for Pagehaul
//!
//! This module provides URL normalization, domain/origin extraction, and the
//! admission policy that decides which discovered links may enter the frontier.

mod admission;
mod domain;
mod normalize;

// Re-export main functions
pub use admission::{is_admissible, AdmissionVerdict};
pub use domain::{extract_domain, origin_of};
pub use normalize::normalize_url;
