//! Runtime configuration for model services and local storage.
//!
//! Everything is driven by environment variables with defaults matching the
//! reference deployment (DashScope models, 1024-dimension embeddings). Only
//! the API key is mandatory.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Embedding model id.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-v4";

/// Embedding dimensionality of the reference deployment.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Rerank model id.
pub const DEFAULT_RERANK_MODEL: &str = "qwen3-rerank";

/// Rerank HTTP endpoint.
pub const DEFAULT_RERANK_URL: &str = "https://dashscope.aliyuncs.com/compatible-api/v1/reranks";

/// Answer-generation model id.
pub const DEFAULT_GENERATION_MODEL: &str = "qwen-plus";

/// Vector collection (LanceDB table) holding the article chunks.
pub const DEFAULT_COLLECTION: &str = "article_chunks";

/// Candidates fetched from the vector index per question.
pub const DEFAULT_TOP_K: usize = 10;

/// Candidates kept after reranking.
pub const DEFAULT_TOP_N: usize = 5;

// ============================================================================
// Config
// ============================================================================

/// Configuration surface required by the indexing and retrieval core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the model provider (embedding, rerank, generation).
    pub api_key: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub rerank_model: String,
    pub rerank_url: String,
    pub generation_model: String,
    /// Directory holding the chunk database and the vector index.
    pub data_dir: PathBuf,
    /// Vector collection name.
    pub collection: String,
    pub top_k: usize,
    pub top_n: usize,
}

impl Config {
    /// Builds a config with reference-deployment defaults.
    pub fn new(api_key: String, data_dir: PathBuf) -> Self {
        Self {
            api_key,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            rerank_url: DEFAULT_RERANK_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            data_dir,
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: DEFAULT_TOP_K,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Loads the configuration from environment variables.
    ///
    /// `DASHSCOPE_API_KEY` is required; everything else falls back to the
    /// defaults above. Optional overrides: `QUILL_RAG_DATA_DIR`,
    /// `RERANK_API_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = get_api_key()?;

        let data_dir = std::env::var("QUILL_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| get_data_dir());

        let mut config = Self::new(api_key, data_dir);

        if let Ok(url) = std::env::var("RERANK_API_URL") {
            if !url.is_empty() {
                config.rerank_url = url;
            }
        }

        Ok(config)
    }

    /// Path of the SQLite chunk database.
    pub fn chunk_db_path(&self) -> PathBuf {
        self.data_dir.join("chunks.db")
    }

    /// Path of the LanceDB vector index.
    pub fn vector_index_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }
}

// ============================================================================
// Data Directory & API Key
// ============================================================================

/// Default data directory (~/.quill-rag/).
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quill-rag")
}

/// Reads the model-provider credential from `DASHSCOPE_API_KEY`.
pub fn get_api_key() -> Result<String> {
    match std::env::var("DASHSCOPE_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(Error::Config(
            "DASHSCOPE_API_KEY not set. Export your DashScope API key: \
             export DASHSCOPE_API_KEY=your-api-key"
                .to_string(),
        )),
    }
}

/// Whether a model-provider credential is configured.
pub fn has_api_key() -> bool {
    std::env::var("DASHSCOPE_API_KEY")
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
