//! Synchronization between the chunk table and the vector index.
//!
//! `sync` is invoked whenever an article becomes or remains published;
//! `remove` when it is deleted or demoted to draft. A sync rebuilds the
//! article's indexed representation in full: both stores are cleared first,
//! so re-running after a partial failure converges on the current content.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};

use super::chunker::chunk_markdown;
use super::store::ChunkStore;
use super::vector::{VectorIndex, VectorRecord};

/// Outcome of one successful sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Chunks written to both stores.
    pub chunks: usize,
}

// ============================================================================
// SyncEngine
// ============================================================================

pub struct SyncEngine {
    store: Arc<ChunkStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<ChunkStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// Rebuilds the indexed representation of a published article.
    ///
    /// Protocol, strictly in order:
    /// 1. delete the article's chunk rows,
    /// 2. delete its vector records,
    /// 3. chunk the content (zero chunks: done, the article is unindexed),
    /// 4. insert the new chunk rows transactionally with ordinals 0..n-1,
    /// 5. embed each chunk and upsert its vector record.
    ///
    /// An embedding or vector-store failure in step 5 aborts the call with
    /// `Error::Sync`. The chunk rows from step 4 stay: they are the intended
    /// state, and the caller retries by calling `sync` again.
    pub async fn sync(&self, article_id: i64, title: &str, content: &str) -> Result<SyncReport> {
        self.store
            .delete_chunks(article_id)
            .map_err(|e| Error::sync(article_id, e))?;
        self.index
            .delete_by_article(article_id)
            .await
            .map_err(|e| Error::sync(article_id, e))?;

        let chunks = chunk_markdown(content, title);
        if chunks.is_empty() {
            tracing::debug!(article_id, "no chunks produced, article left unindexed");
            return Ok(SyncReport::default());
        }

        let records = self
            .store
            .insert_chunks(article_id, &chunks)
            .map_err(|e| Error::sync(article_id, e))?;

        for record in &records {
            let embedding = self
                .embedder
                .embed(&record.chunk_text)
                .await
                .map_err(|e| Error::sync(article_id, e))?;

            let vector_record = VectorRecord {
                record_id: VectorRecord::record_id_for(record.id),
                chunk_id: record.id,
                article_id,
                title: title.to_string(),
                chunk_text: record.chunk_text.clone(),
                chunk_index: record.chunk_index,
                embedding,
            };

            self.index
                .upsert(&vector_record)
                .await
                .map_err(|e| Error::sync(article_id, e))?;
        }

        tracing::info!(article_id, chunks = records.len(), "article index synchronized");
        Ok(SyncReport {
            chunks: records.len(),
        })
    }

    /// Deletes an article's vector records. Chunk rows are the relational
    /// store's cascading-delete concern and are not touched here.
    pub async fn remove(&self, article_id: i64) -> Result<usize> {
        let removed = self
            .index
            .delete_by_article(article_id)
            .await
            .map_err(|e| Error::sync(article_id, e))?;

        tracing::info!(article_id, removed, "article vectors removed");
        Ok(removed)
    }
}

// ============================================================================
// Tests
// ============================================================================
