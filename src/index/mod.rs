//! Article indexing: chunking, relational chunk storage, vector index, and
//! the sync engine keeping the two stores in lockstep.
//!
//! - Chunker: markdown-aware split into bounded, self-contained chunks
//! - ChunkStore: SQLite chunk table (the relational side)
//! - VectorIndex: LanceDB (persistent) or in-memory (tests, small corpora)
//! - SyncEngine: full delete-and-rebuild per article mutation

mod chunker;
mod lance;
mod memory;
mod store;
mod sync;
mod vector;

// Re-exports
pub use chunker::{chunk_markdown, estimate_tokens, split_by_sentences, MAX_CHUNK_TOKENS};
pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use store::{ChunkRecord, ChunkStore};
pub use sync::{SyncEngine, SyncReport};
pub use vector::{cosine_distance, cosine_similarity, ScoredRecord, VectorIndex, VectorRecord};
