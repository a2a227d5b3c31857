//! SQLite implementation of the session store

use crate::crawler::PageResult;
use crate::frontier::FrontierEntry;
use crate::stats::ErrorKind;
use crate::storage::schema::initialize_schema;
use crate::storage::{SessionRecord, SessionStatus, SessionStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// SQLite-backed session store
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Opens (creating if needed) a session database at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        Ok(SessionRecord {
            id: row.get(0)?,
            start_url: row.get(1)?,
            max_depth: row.get(2)?,
            max_pages: row.get(3)?,
            pages_crawled: row.get::<_, i64>(4)? as u64,
            total_errors: row.get::<_, i64>(5)? as u64,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
            status: SessionStatus::from_db_string(&row.get::<_, String>(8)?)
                .unwrap_or(SessionStatus::Running),
            config_hash: row.get(9)?,
        })
    }
}

const SESSION_COLUMNS: &str = "id, start_url, max_depth, max_pages, pages_crawled, total_errors, \
     started_at, completed_at, status, config_hash";

impl SessionStore for SqliteSessionStore {
    fn start_session(
        &mut self,
        start_url: &str,
        max_depth: u32,
        max_pages: u32,
        config_hash: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_sessions (start_url, max_depth, max_pages, started_at, status, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                start_url,
                max_depth,
                max_pages,
                now,
                SessionStatus::Running.to_db_string(),
                config_hash
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn end_session(
        &mut self,
        session_id: i64,
        pages_crawled: u64,
        error_count: u64,
        status: SessionStatus,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_sessions
             SET pages_crawled = ?1, total_errors = ?2, completed_at = ?3, status = ?4
             WHERE id = ?5",
            params![
                pages_crawled as i64,
                error_count as i64,
                now,
                status.to_db_string(),
                session_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord> {
        let sql = format!(
            "SELECT {} FROM crawl_sessions WHERE id = ?1",
            SESSION_COLUMNS
        );
        self.conn
            .query_row(&sql, params![session_id], Self::row_to_session)
            .optional()?
            .ok_or(StorageError::SessionNotFound(session_id))
    }

    fn get_latest_session(&self) -> StorageResult<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_sessions ORDER BY id DESC LIMIT 1",
            SESSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, [], Self::row_to_session)
            .optional()?)
    }

    fn list_incomplete_sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_sessions WHERE status != 'completed' ORDER BY id DESC",
            SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn save_page(
        &mut self,
        session_id: i64,
        page: &PageResult,
        title: Option<&str>,
        extracted_data: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pages
             (session_id, url, title, status_code, content_type, content_length,
              response_time, fetched_at, extracted_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session_id,
                page.url.as_str(),
                title,
                page.status_code,
                page.content_type,
                page.byte_length as i64,
                page.response_time.as_secs_f64(),
                page.fetched_at.to_rfc3339(),
                extracted_data
            ],
        )?;
        Ok(())
    }

    fn log_error(
        &mut self,
        session_id: i64,
        url: &str,
        kind: ErrorKind,
        message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO errors (session_id, url, error_kind, error_message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, url, kind.as_str(), message, now],
        )?;
        Ok(())
    }

    fn count_pages(&self, session_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_errors(&self, session_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM errors WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn save_pending_work(
        &mut self,
        session_id: i64,
        entries: &[FrontierEntry],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM queue_state WHERE session_id = ?1 AND status = 'pending'",
            params![session_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO queue_state (session_id, url, depth, status)
                 VALUES (?1, ?2, ?3, 'pending')",
            )?;
            for entry in entries {
                stmt.execute(params![session_id, entry.url.as_str(), entry.depth])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_pending_work(&self, session_id: i64) -> StorageResult<Vec<FrontierEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, depth FROM queue_state
             WHERE session_id = ?1 AND status = 'pending' ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (url, depth) = row?;
            // Rows with URLs that no longer parse are dropped rather than
            // failing the whole resume.
            if let Ok(url) = Url::parse(&url) {
                entries.push(FrontierEntry { url, depth });
            }
        }
        Ok(entries)
    }

    fn save_visited(&mut self, session_id: i64, visited: &HashSet<String>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM queue_state WHERE session_id = ?1 AND status = 'visited'",
            params![session_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO queue_state (session_id, url, depth, status)
                 VALUES (?1, ?2, 0, 'visited')",
            )?;
            for url in visited {
                stmt.execute(params![session_id, url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_visited(&self, session_id: i64) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM queue_state WHERE session_id = ?1 AND status = 'visited'",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut visited = HashSet::new();
        for row in rows {
            visited.insert(row?);
        }
        Ok(visited)
    }
}
