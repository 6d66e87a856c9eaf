//! Relational chunk storage over SQLite.
//!
//! Holds the current chunk set per article. The chunk set is only ever
//! written as a whole: `insert_chunks` runs in one transaction and
//! `delete_chunks` clears an article completely, so retrieval never observes
//! a partially generated set. Article rows themselves live with the external
//! content-management layer; this table only references their ids.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// One stored chunk row.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Generated chunk id, stable only within one generation of the set.
    pub id: i64,
    pub article_id: i64,
    /// 0-based, contiguous ordinal within the article.
    pub chunk_index: i32,
    pub chunk_text: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// ChunkStore
// ============================================================================

/// SQLite-backed chunk table.
pub struct ChunkStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ChunkStore {
    /// Opens the store, creating the database and schema if missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::ChunkStore(format!("failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB file path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::ChunkStore("connection lock poisoned".to_string()))
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_article ON chunks(article_id)",
            [],
        )?;

        tracing::debug!("chunk store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// Inserts a full chunk sequence for an article, assigning ordinals
    /// 0..n-1, and returns the rows with their generated ids.
    ///
    /// Runs in a single transaction so a partial set is never visible.
    pub fn insert_chunks(&self, article_id: i64, texts: &[String]) -> Result<Vec<ChunkRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut records = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            tx.execute(
                "INSERT INTO chunks (article_id, chunk_index, chunk_text, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![article_id, index as i32, text, now_str],
            )?;

            records.push(ChunkRecord {
                id: tx.last_insert_rowid(),
                article_id,
                chunk_index: index as i32,
                chunk_text: text.clone(),
                created_at: now,
            });
        }

        tx.commit()?;
        Ok(records)
    }

    /// Lists an article's chunks ordered by ordinal.
    pub fn list_chunks(&self, article_id: i64) -> Result<Vec<ChunkRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, article_id, chunk_index, chunk_text, created_at FROM chunks
             WHERE article_id = ?1
             ORDER BY chunk_index",
        )?;

        let records = stmt
            .query_map(params![article_id], |row| {
                Ok(ChunkRecord {
                    id: row.get(0)?,
                    article_id: row.get(1)?,
                    chunk_index: row.get(2)?,
                    chunk_text: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Deletes all chunks of an article. Returns the number of deleted rows;
    /// zero matches is a no-op, not an error.
    pub fn delete_chunks(&self, article_id: i64) -> Result<usize> {
        let conn = self.lock()?;

        let rows = conn.execute(
            "DELETE FROM chunks WHERE article_id = ?1",
            params![article_id],
        )?;

        Ok(rows)
    }

    /// Total chunk rows across all articles.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
