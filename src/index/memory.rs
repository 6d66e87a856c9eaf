//! In-memory vector index.
//!
//! Exhaustive cosine scan over a guarded map. Same contract as the LanceDB
//! adapter; useful for tests and throwaway corpora that fit in memory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::vector::{cosine_distance, ScoredRecord, VectorIndex, VectorRecord};

#[derive(Default)]
pub struct MemoryVectorIndex {
    records: Mutex<HashMap<String, VectorRecord>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, VectorRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::VectorIndex("record map lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, record: &VectorRecord) -> Result<()> {
        let mut records = self.lock()?;
        records.insert(record.record_id.clone(), record.clone());
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let records = self.lock()?;

        let mut scored: Vec<ScoredRecord> = records
            .values()
            .map(|r| ScoredRecord {
                record_id: r.record_id.clone(),
                article_id: r.article_id,
                title: r.title.clone(),
                chunk_text: r.chunk_text.clone(),
                chunk_index: r.chunk_index,
                distance: cosine_distance(embedding, &r.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn delete_by_article(&self, article_id: i64) -> Result<usize> {
        let mut records = self.lock()?;

        let before = records.len();
        records.retain(|_, r| r.article_id != article_id);
        Ok(before - records.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chunk_id: i64, article_id: i64, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            record_id: VectorRecord::record_id_for(chunk_id),
            chunk_id,
            article_id,
            title: "Title".to_string(),
            chunk_text: format!("chunk {}", chunk_id),
            chunk_index: 0,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = MemoryVectorIndex::new();
        index.upsert(&record(1, 1, vec![1.0, 0.0])).await.unwrap();
        index.upsert(&record(2, 1, vec![0.0, 1.0])).await.unwrap();
        index.upsert(&record(3, 2, vec![0.9, 0.1])).await.unwrap();

        let results = index.query(&[1.0, 0.0], 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record_id, "chunk:1");
        assert_eq!(results[1].record_id, "chunk:3");
        assert_eq!(results[2].record_id, "chunk:2");
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let index = MemoryVectorIndex::new();
        index.upsert(&record(1, 1, vec![1.0, 0.0])).await.unwrap();

        let mut updated = record(1, 1, vec![0.0, 1.0]);
        updated.chunk_text = "new text".to_string();
        index.upsert(&updated).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk_text, "new text");
    }

    #[tokio::test]
    async fn test_delete_by_article() {
        let index = MemoryVectorIndex::new();
        index.upsert(&record(1, 1, vec![1.0, 0.0])).await.unwrap();
        index.upsert(&record(2, 1, vec![0.0, 1.0])).await.unwrap();
        index.upsert(&record(3, 2, vec![0.5, 0.5])).await.unwrap();

        assert_eq!(index.delete_by_article(1).await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.delete_by_article(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let index = MemoryVectorIndex::new();
        for i in 0..10 {
            index
                .upsert(&record(i, 1, vec![1.0, i as f32 * 0.1]))
                .await
                .unwrap();
        }

        let results = index.query(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }
}
