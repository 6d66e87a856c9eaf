//! quill-rag - article indexing and retrieval-augmented question answering.
//!
//! Published articles are chunked into bounded semantic units, mirrored into
//! a SQLite chunk table and a LanceDB vector index, and served to readers
//! through an embed / retrieve / rerank / generate pipeline.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod rag;

// Re-exports
pub use config::{get_api_key, get_data_dir, has_api_key, Config};
pub use embedding::{DashScopeEmbedding, EmbeddingProvider};
pub use error::{Error, Result};
pub use index::{
    chunk_markdown, estimate_tokens, ChunkRecord, ChunkStore, LanceVectorIndex, MemoryVectorIndex,
    ScoredRecord, SyncEngine, SyncReport, VectorIndex, VectorRecord, MAX_CHUNK_TOKENS,
};
pub use rag::{
    AnswerGenerator, Candidate, ChatMessage, DashScopeGenerator, DashScopeReranker, RagPipeline,
    RankedItem, Reranker, RerankOutcome, NO_CONTENT_ANSWER,
};
