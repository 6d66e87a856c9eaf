//! Candidate reranking via the DashScope rerank API.
//!
//! The service scores (query, document) pairs jointly and returns a
//! permutation with relevance scores. Failures here are never fatal to a
//! question: the pipeline falls back to the pre-rerank order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

// ============================================================================
// Reranker Trait
// ============================================================================

/// One entry of the reranked permutation: an index into the submitted
/// document list plus its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedItem {
    pub index: usize,
    pub relevance_score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorders `documents` by relevance to `query`. The result references
    /// documents by their index in the input; entries may be missing or, from
    /// a misbehaving upstream, out of range. Callers decide what to drop.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RankedItem>>;
}

// ============================================================================
// DashScope Reranker
// ============================================================================

/// DashScope rerank client (`qwen3-rerank` in the reference deployment).
#[derive(Debug)]
pub struct DashScopeReranker {
    api_key: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

impl DashScopeReranker {
    pub fn new(api_key: String, model: String, url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            url,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.rerank_model.clone(),
            config.rerank_url.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: f32,
}

#[async_trait]
impl Reranker for DashScopeReranker {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<RankedItem>> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: documents.len(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::RerankService(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::RerankService(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::RerankService(format!("{}: {}", status, body)));
        }

        // A 200 without a `results` field is a malformed payload, which the
        // pipeline treats the same as an outright failure.
        let parsed: RerankResponse = serde_json::from_str(&body)
            .map_err(|e| Error::RerankService(format!("malformed response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| RankedItem {
                index: r.index,
                relevance_score: r.relevance_score,
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let documents = vec!["doc a".to_string(), "doc b".to_string()];
        let request = RerankRequest {
            model: "qwen3-rerank",
            query: "what is doc a?",
            documents: &documents,
            top_n: 2,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen3-rerank");
        assert_eq!(json["documents"].as_array().unwrap().len(), 2);
        assert_eq!(json["top_n"], 2);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"results": [
            {"index": 2, "relevance_score": 0.91},
            {"index": 0, "relevance_score": 0.40}
        ]}"#;

        let parsed: RerankResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].index, 2);
        assert!((parsed.results[0].relevance_score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_missing_results_field_is_malformed() {
        let parsed = serde_json::from_str::<RerankResponse>(r#"{"output": {}}"#);
        assert!(parsed.is_err());
    }
}
