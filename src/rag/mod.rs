//! Retrieval-augmented question answering.
//!
//! - Reranker: relevance reordering of retrieved chunks
//! - AnswerGenerator: chat-completion client for the final answer
//! - RagPipeline: embed, retrieve, rerank, generate, with graceful
//!   degradation at every stage

mod generation;
mod pipeline;
mod rerank;

// Re-exports
pub use generation::{AnswerGenerator, ChatMessage, DashScopeGenerator};
pub use pipeline::{Candidate, RagPipeline, RerankOutcome, NO_CONTENT_ANSWER};
pub use rerank::{DashScopeReranker, RankedItem, Reranker};
