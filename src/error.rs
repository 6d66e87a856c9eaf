//! Error types shared across the indexing and retrieval pipeline.
//!
//! Library code returns `Result<T, Error>`; the CLI layer wraps these in
//! `anyhow` for presentation. Sync-time failures carry the article id so the
//! caller knows which article to retry.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The upstream embedding call failed or returned a non-success status.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The rerank call failed or returned a malformed payload. Non-fatal for
    /// retrieval: the pipeline degrades to the pre-rerank order.
    #[error("rerank service error: {0}")]
    RerankService(String),

    /// The answer-generation call failed or returned a non-success status.
    #[error("answer generation error: {0}")]
    AnswerGeneration(String),

    /// Chunk store failure outside of SQLite itself (e.g. a poisoned lock).
    #[error("chunk store error: {0}")]
    ChunkStore(String),

    #[error("chunk store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("vector index error: {0}")]
    VectorIndex(String),

    /// Any failure while synchronizing an article's indexed representation.
    /// Chunk rows already written stay in place; re-running `sync` clears and
    /// rebuilds them.
    #[error("index sync failed for article {article_id}: {source}")]
    Sync {
        article_id: i64,
        #[source]
        source: Box<Error>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wraps a sync-time failure with the article it belongs to.
    pub fn sync(article_id: i64, source: Error) -> Self {
        Error::Sync {
            article_id,
            source: Box::new(source),
        }
    }
}

impl From<lancedb::Error> for Error {
    fn from(err: lancedb::Error) -> Self {
        Error::VectorIndex(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Error::VectorIndex(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_carries_article_id() {
        let err = Error::sync(42, Error::EmbeddingService("timeout".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("article 42"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_sync_error_exposes_source() {
        use std::error::Error as _;

        let err = Error::sync(7, Error::VectorIndex("table missing".to_string()));
        let source = err.source().expect("sync error has a source");
        assert!(source.to_string().contains("table missing"));
    }
}
