//! Vector index contract and record types.
//!
//! The index is an external black box reached through this trait: upsert,
//! similarity query, delete-by-article. Records carry denormalized article
//! metadata so retrieval results are self-describing without a join back to
//! the chunk table.

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// One vector record, one per chunk of a published article.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Derived identifier, `chunk:<chunk_id>`.
    pub record_id: String,
    pub chunk_id: i64,
    pub article_id: i64,
    pub title: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Record id for a chunk.
    pub fn record_id_for(chunk_id: i64) -> String {
        format!("chunk:{}", chunk_id)
    }
}

/// A query hit: a stored record plus its cosine distance from the query
/// vector (smaller is closer).
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record_id: String,
    pub article_id: i64,
    pub title: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub distance: f32,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// Vector index over one logical collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces a record. Idempotent: re-upserting the same
    /// `record_id` replaces the prior content.
    async fn upsert(&self, record: &VectorRecord) -> Result<()>;

    /// Top-k most similar records, ordered by ascending cosine distance.
    /// The relative order of equal distances is unspecified.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>>;

    /// Deletes every record belonging to an article. Zero matches is a
    /// no-op. Returns the number of records removed.
    async fn delete_by_article(&self, article_id: i64) -> Result<usize>;

    /// Total records in the collection.
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Cosine similarity between two vectors, -1.0 to 1.0. Mismatched or empty
/// inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance (`1 - similarity`), 0.0 to 2.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_format() {
        assert_eq!(VectorRecord::record_id_for(42), "chunk:42");
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) - -1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        let a: Vec<f32> = vec![];
        let b: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_distance_ordering() {
        let query = vec![1.0, 0.0];
        let near = vec![0.9, 0.1];
        let far = vec![0.0, 1.0];

        assert!(cosine_distance(&query, &near) < cosine_distance(&query, &far));
    }
}
