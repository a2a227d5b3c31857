//! Session persistence
//!
//! Records crawl session lifecycle plus per-page and per-error rows. The
//! engine only knows the [`SessionStore`] trait and treats every call as
//! best-effort: a persistence failure is logged by the caller and never
//! stops crawling. The resume methods are an extension point: they save and
//! reload pending frontier entries and the visited set for an interrupted
//! session without assuming anything further about the storage layout.

mod schema;
mod sqlite;

pub use sqlite::SqliteSessionStore;

use crate::crawler::PageResult;
use crate::frontier::FrontierEntry;
use crate::stats::ErrorKind;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Lifecycle state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// A crawl session row
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub start_url: String,
    pub max_depth: u32,
    pub max_pages: u32,
    pub pages_crawled: u64,
    pub total_errors: u64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: SessionStatus,
    pub config_hash: Option<String>,
}

/// Trait for session storage backends
pub trait SessionStore: Send {
    // ===== Session lifecycle =====

    /// Creates a new running session and returns its ID
    fn start_session(
        &mut self,
        start_url: &str,
        max_depth: u32,
        max_pages: u32,
        config_hash: Option<&str>,
    ) -> StorageResult<i64>;

    /// Closes a session with final counts and a terminal status
    fn end_session(
        &mut self,
        session_id: i64,
        pages_crawled: u64,
        error_count: u64,
        status: SessionStatus,
    ) -> StorageResult<()>;

    /// Gets a session by ID
    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord>;

    /// Gets the most recent session, if any
    fn get_latest_session(&self) -> StorageResult<Option<SessionRecord>>;

    /// Lists sessions that are still running or were interrupted
    fn list_incomplete_sessions(&self) -> StorageResult<Vec<SessionRecord>>;

    // ===== Page and error rows =====

    /// Records a downloaded page
    fn save_page(
        &mut self,
        session_id: i64,
        page: &PageResult,
        title: Option<&str>,
        extracted_data: Option<&str>,
    ) -> StorageResult<()>;

    /// Records a per-URL error
    fn log_error(
        &mut self,
        session_id: i64,
        url: &str,
        kind: ErrorKind,
        message: &str,
    ) -> StorageResult<()>;

    /// Counts pages recorded for a session
    fn count_pages(&self, session_id: i64) -> StorageResult<u64>;

    /// Counts errors recorded for a session
    fn count_errors(&self, session_id: i64) -> StorageResult<u64>;

    // ===== Resume extension point =====

    /// Replaces the saved pending-work queue for a session
    fn save_pending_work(
        &mut self,
        session_id: i64,
        entries: &[FrontierEntry],
    ) -> StorageResult<()>;

    /// Loads the saved pending-work queue in insertion order
    fn load_pending_work(&self, session_id: i64) -> StorageResult<Vec<FrontierEntry>>;

    /// Replaces the saved visited set for a session
    fn save_visited(&mut self, session_id: i64, visited: &HashSet<String>) -> StorageResult<()>;

    /// Loads the saved visited set
    fn load_visited(&self, session_id: i64) -> StorageResult<HashSet<String>>;
}
