//! Question answering over the indexed articles.
//!
//! embed the question, retrieve top-k chunks by vector similarity, rerank,
//! keep the top-n, and generate an answer grounded in those chunks. Every
//! stage degrades gracefully: a rerank failure falls back to vector order,
//! and any other failure becomes an apology answer. `answer` never errors
//! and never panics.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{ScoredRecord, VectorIndex};

use super::generation::{AnswerGenerator, ChatMessage};
use super::rerank::Reranker;

/// Answer returned verbatim when retrieval finds nothing at all.
pub const NO_CONTENT_ANSWER: &str =
    "I could not find any published content related to your question. \
     Please try asking about a topic covered on this site.";

const SYSTEM_PROMPT: &str = "\
You are a question-answering assistant for a personal blog. Answer using \
only the reference documents supplied in the user message. If the documents \
do not cover the question, say the site has no content on that topic instead \
of guessing. Mention the titles of the articles you drew from. Keep the tone \
concise, friendly, and professional.";

// ============================================================================
// Candidates
// ============================================================================

/// A retrieved chunk on its way through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub article_id: i64,
    pub title: String,
    pub chunk_text: String,
    pub chunk_index: i32,
    /// Vector distance from the retrieval stage.
    pub distance: f32,
    /// Present only when the rerank stage succeeded.
    pub relevance_score: Option<f32>,
}

impl Candidate {
    fn from_scored(record: ScoredRecord) -> Self {
        Self {
            article_id: record.article_id,
            title: record.title,
            chunk_text: record.chunk_text,
            chunk_index: record.chunk_index,
            distance: record.distance,
            relevance_score: None,
        }
    }
}

/// Result of the rerank stage. `Unranked` keeps the vector-similarity order
/// and marks the answer as degraded rather than failing the question.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    Ranked(Vec<Candidate>),
    Unranked(Vec<Candidate>),
}

impl RerankOutcome {
    pub fn into_candidates(self) -> Vec<Candidate> {
        match self {
            RerankOutcome::Ranked(c) | RerankOutcome::Unranked(c) => c,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RerankOutcome::Unranked(_))
    }
}

// ============================================================================
// RagPipeline
// ============================================================================

pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
    top_n: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn AnswerGenerator>,
        top_k: usize,
        top_n: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            generator,
            top_k,
            top_n,
        }
    }

    /// Answers a question. Always returns an answer string: retrieval
    /// misses get the no-content answer, and failures get an apology
    /// carrying the error detail.
    pub async fn answer(&self, question: &str) -> String {
        match self.try_answer(question).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!(error = %err, "question answering failed");
                format!(
                    "Sorry, something went wrong while answering your question ({}). \
                     Please try again in a moment.",
                    err
                )
            }
        }
    }

    async fn try_answer(&self, question: &str) -> Result<String> {
        let embedding = self.embedder.embed(question).await?;
        let retrieved = self.index.query(&embedding, self.top_k).await?;

        if retrieved.is_empty() {
            tracing::info!("retrieval returned no chunks");
            return Ok(NO_CONTENT_ANSWER.to_string());
        }

        let candidates: Vec<Candidate> =
            retrieved.into_iter().map(Candidate::from_scored).collect();

        let outcome = self.rerank(question, candidates).await;
        if outcome.is_degraded() {
            tracing::warn!("rerank unavailable, using vector-similarity order");
        }

        let mut ranked = outcome.into_candidates();
        ranked.truncate(self.top_n);

        let context = build_context(&ranked);
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Reference documents:\n\n{}\n\nQuestion: {}",
                context, question
            )),
        ];

        self.generator.generate(&messages).await
    }

    /// Runs the rerank stage. Upstream failure keeps the vector order;
    /// indices outside the candidate list are dropped.
    async fn rerank(&self, question: &str, candidates: Vec<Candidate>) -> RerankOutcome {
        let documents: Vec<String> = candidates.iter().map(|c| c.chunk_text.clone()).collect();

        let items = match self.reranker.rerank(question, &documents).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %err, "rerank request failed");
                return RerankOutcome::Unranked(candidates);
            }
        };

        let mut taken: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut ranked = Vec::with_capacity(items.len());

        for item in items {
            match taken.get_mut(item.index).and_then(Option::take) {
                Some(mut candidate) => {
                    candidate.relevance_score = Some(item.relevance_score);
                    ranked.push(candidate);
                }
                None => {
                    tracing::warn!(index = item.index, "rerank returned an unknown index");
                }
            }
        }

        RerankOutcome::Ranked(ranked)
    }
}

/// Formats the retained candidates as the reference block for the generator.
fn build_context(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[Document {}] (article {}, title: {})\n{}",
                i + 1,
                c.article_id,
                c.title,
                c.chunk_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
