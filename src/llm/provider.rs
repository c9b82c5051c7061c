use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Text-generation and embedding capability.
///
/// Both operations may be slow and may fail; callers decide whether a
/// failure is fatal (query time) or recoverable (per-page during indexing).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for status reporting (e.g. "openai_http").
    fn name(&self) -> &str;

    /// Check if the provider is healthy/reachable.
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// Chat completion (non-streaming).
    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError>;

    /// Generate one embedding per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
