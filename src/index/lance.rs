//! LanceDB-backed vector index.
//!
//! One table per logical collection. The connection is created lazily on
//! first use through a `tokio::sync::OnceCell`, so concurrent first calls
//! initialize exactly once; the table itself is created when the first
//! record arrives. Filters only ever interpolate integer-derived values
//! (`chunk:<rowid>`, article ids), never free text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

use super::vector::{ScoredRecord, VectorIndex, VectorRecord};

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// Vector index over a LanceDB table, cosine distance.
pub struct LanceVectorIndex {
    path: PathBuf,
    table_name: String,
    dimension: i32,
    conn: OnceCell<Connection>,
}

impl LanceVectorIndex {
    /// Creates the index handle. No I/O happens until the first operation.
    ///
    /// # Arguments
    /// * `path` - .lance directory path
    /// * `table_name` - collection name inside the database
    /// * `dimension` - embedding dimensionality
    pub fn new(path: &Path, table_name: &str, dimension: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            dimension: dimension as i32,
            conn: OnceCell::new(),
        }
    }

    /// Returns the connection, establishing it on first call. Safe under
    /// concurrent first use: the cell initializes at most once.
    async fn connection(&self) -> Result<&Connection> {
        self.conn
            .get_or_try_init(|| async {
                if let Some(parent) = self.path.parent() {
                    if !parent.exists() {
                        tokio::fs::create_dir_all(parent).await.map_err(|e| {
                            Error::VectorIndex(format!(
                                "failed to create vector index directory: {}",
                                e
                            ))
                        })?;
                    }
                }

                let path_str = self
                    .path
                    .to_str()
                    .ok_or_else(|| Error::VectorIndex("invalid path encoding".to_string()))?;

                let conn = lancedb::connect(path_str).execute().await?;
                tracing::debug!(path = %self.path.display(), "vector index connected");
                Ok(conn)
            })
            .await
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("record_id", DataType::Utf8, false),
            Field::new("chunk_id", DataType::Int64, false),
            Field::new("article_id", DataType::Int64, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    fn records_to_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            return Err(Error::VectorIndex(
                "cannot build a batch from zero records".to_string(),
            ));
        }

        for record in records {
            if record.embedding.len() != self.dimension as usize {
                return Err(Error::VectorIndex(format!(
                    "record {} has dimension {}, index expects {}",
                    record.record_id,
                    record.embedding.len(),
                    self.dimension
                )));
            }
        }

        let record_ids: Vec<&str> = records.iter().map(|r| r.record_id.as_str()).collect();
        let chunk_ids: Vec<i64> = records.iter().map(|r| r.chunk_id).collect();
        let article_ids: Vec<i64> = records.iter().map(|r| r.article_id).collect();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        let chunk_texts: Vec<&str> = records.iter().map(|r| r.chunk_text.as_str()).collect();
        let chunk_indices: Vec<i32> = records.iter().map(|r| r.chunk_index).collect();

        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )?;

        let batch = RecordBatch::try_new(
            Arc::new(self.schema()),
            vec![
                Arc::new(StringArray::from(record_ids)),
                Arc::new(Int64Array::from(chunk_ids)),
                Arc::new(Int64Array::from(article_ids)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(embeddings_list),
            ],
        )?;

        Ok(batch)
    }

    async fn table_exists(&self) -> Result<bool> {
        let db = self.connection().await?;
        let names = db.table_names().execute().await?;
        Ok(names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        let db = self.connection().await?;
        Ok(db.open_table(&self.table_name).execute().await?)
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, record: &VectorRecord) -> Result<()> {
        let batch = self.records_to_batch(std::slice::from_ref(record))?;
        let schema = batch.schema();

        if self.table_exists().await? {
            let table = self.open_table().await?;

            // record_id derives from an integer rowid, safe to interpolate.
            table
                .delete(&format!("record_id = '{}'", record.record_id))
                .await?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table.add(batches).execute().await?;
        } else {
            let db = self.connection().await?;
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            db.create_table(&self.table_name, batches).execute().await?;
        }

        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        if !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(embedding.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut scored = Vec::new();
        for batch in batches {
            let record_ids = string_column(&batch, "record_id")?;
            let article_ids = int64_column(&batch, "article_id")?;
            let titles = string_column(&batch, "title")?;
            let chunk_texts = string_column(&batch, "chunk_text")?;
            let chunk_indices = int32_column(&batch, "chunk_index")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| Error::VectorIndex("missing _distance column".to_string()))?;

            for i in 0..batch.num_rows() {
                scored.push(ScoredRecord {
                    record_id: record_ids.value(i).to_string(),
                    article_id: article_ids.value(i),
                    title: titles.value(i).to_string(),
                    chunk_text: chunk_texts.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    distance: distances.value(i),
                });
            }
        }

        Ok(scored)
    }

    async fn delete_by_article(&self, article_id: i64) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let before = table.count_rows(None).await?;

        table.delete(&format!("article_id = {}", article_id)).await?;

        let after = table.count_rows(None).await?;
        Ok(before.saturating_sub(after))
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        Ok(table.count_rows(None).await?)
    }
}

// ============================================================================
// Column Helpers
// ============================================================================

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::VectorIndex(format!("missing {} column", name)))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| Error::VectorIndex(format!("missing {} column", name)))
}

fn int32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::VectorIndex(format!("missing {} column", name)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_DIMENSION: usize = 8;

    fn test_record(chunk_id: i64, article_id: i64, seed: f32) -> VectorRecord {
        VectorRecord {
            record_id: VectorRecord::record_id_for(chunk_id),
            chunk_id,
            article_id,
            title: format!("Article {}", article_id),
            chunk_text: format!("Chunk {} of article {}", chunk_id, article_id),
            chunk_index: 0,
            embedding: (0..TEST_DIMENSION)
                .map(|i| seed + i as f32 * 0.01)
                .collect(),
        }
    }

    fn test_index(dir: &TempDir) -> LanceVectorIndex {
        let path = dir.path().join("test.lance");
        LanceVectorIndex::new(&path, "article_chunks", TEST_DIMENSION)
    }

    #[tokio::test]
    async fn test_empty_index_queries_and_deletes() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir);

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&vec![0.1; TEST_DIMENSION], 5).await.unwrap().is_empty());
        assert_eq!(index.delete_by_article(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir);

        index.upsert(&test_record(1, 10, 0.1)).await.unwrap();
        index.upsert(&test_record(2, 10, 0.9)).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 2);

        let results = index.query(&vec![0.1; TEST_DIMENSION], 2).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 2);
        assert_eq!(results[0].article_id, 10);
        // Ascending distance order.
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_record_id() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir);

        let mut record = test_record(1, 10, 0.1);
        index.upsert(&record).await.unwrap();

        record.chunk_text = "replaced text".to_string();
        index.upsert(&record).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);

        let results = index.query(&record.embedding, 1).await.unwrap();
        assert_eq!(results[0].chunk_text, "replaced text");
    }

    #[tokio::test]
    async fn test_delete_by_article() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir);

        index.upsert(&test_record(1, 10, 0.1)).await.unwrap();
        index.upsert(&test_record(2, 10, 0.2)).await.unwrap();
        index.upsert(&test_record(3, 20, 0.3)).await.unwrap();

        let deleted = index.delete_by_article(10).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(index.count().await.unwrap(), 1);

        let remaining = index.query(&vec![0.3; TEST_DIMENSION], 10).await.unwrap();
        assert!(remaining.iter().all(|r| r.article_id == 20));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let index = test_index(&dir);

        let mut record = test_record(1, 10, 0.1);
        record.embedding = vec![0.1; TEST_DIMENSION + 1];

        let result = index.upsert(&record).await;
        assert!(result.is_err());
    }
}
