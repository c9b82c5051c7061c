//! Secondary relevance scoring for retrieval candidates.

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::LlmProvider;
use crate::core::errors::ApiError;
use crate::vector_math;

/// Scores passages against a query; one score per passage, higher = better.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ApiError>;
}

/// Reranker backed by the embedding capability: the query and every passage
/// are embedded in one batch and scored by cosine similarity.
pub struct EmbeddingReranker {
    llm: Arc<dyn LlmProvider>,
}

impl EmbeddingReranker {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Reranker for EmbeddingReranker {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ApiError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut inputs = Vec::with_capacity(passages.len() + 1);
        inputs.push(query.to_string());
        inputs.extend(passages.iter().cloned());

        let embeddings = self
            .llm
            .embed(&inputs)
            .await
            .map_err(|e| ApiError::upstream("reranking", e))?;

        if embeddings.len() != inputs.len() {
            return Err(ApiError::upstream(
                "reranking",
                format!(
                    "embedding count mismatch: {} != {}",
                    embeddings.len(),
                    inputs.len()
                ),
            ));
        }

        let query_embedding = &embeddings[0];
        let mut scores = Vec::with_capacity(passages.len());
        for candidate in &embeddings[1..] {
            let score = vector_math::cosine_similarity(query_embedding, candidate)
                .map_err(|e| ApiError::upstream("reranking", e))?;
            scores.push(score);
        }

        Ok(scores)
    }
}
