//! Text embedding via the DashScope text-embedding API.
//!
//! Each call is independent: no caching, batching, or client-side retry.
//! Retrying is the caller's decision (the sync engine's rebuild is idempotent,
//! so re-running it after a failure is always safe).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// Text to fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one text. Any non-success upstream response is an
    /// `Error::EmbeddingService`, never a partial result.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensionality.
    fn dimension(&self) -> usize;

    /// Provider name.
    fn name(&self) -> &str;
}

// ============================================================================
// DashScope Embedding
// ============================================================================

/// DashScope text-embedding endpoint.
const DASHSCOPE_EMBEDDING_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/embeddings/text-embedding/text-embedding";

/// DashScope text-embedding client (`text-embedding-v4`, 1024 dimensions in
/// the reference deployment).
#[derive(Debug)]
pub struct DashScopeEmbedding {
    api_key: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl DashScopeEmbedding {
    pub fn new(api_key: String, model: String, dimension: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            dimension,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
    parameters: EmbeddingParameters,
}

#[derive(Debug, Serialize)]
struct EmbeddingInput<'a> {
    texts: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct EmbeddingParameters {
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    output: EmbeddingOutput,
}

#[derive(Debug, Deserialize)]
struct EmbeddingOutput {
    embeddings: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// DashScope error body.
#[derive(Debug, Deserialize)]
struct DashScopeError {
    #[serde(default)]
    code: String,
    message: String,
}

#[async_trait]
impl EmbeddingProvider for DashScopeEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: EmbeddingInput { texts: vec![text] },
            parameters: EmbeddingParameters {
                dimension: self.dimension,
            },
        };

        let response = self
            .client
            .post(DASHSCOPE_EMBEDDING_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingService(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::EmbeddingService(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<DashScopeError>(&body) {
                return Err(Error::EmbeddingService(format!(
                    "{} ({}): {}",
                    status, err.code, err.message
                )));
            }
            return Err(Error::EmbeddingService(format!("{}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| Error::EmbeddingService(format!("malformed response: {}", e)))?;

        let embedding = parsed
            .output
            .embeddings
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| Error::EmbeddingService("response carried no embedding".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(Error::EmbeddingService(format!(
                "expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
