pub mod openai_http;
pub mod provider;
pub mod reranker;
pub mod types;

pub use openai_http::OpenAiHttpProvider;
pub use provider::LlmProvider;
pub use reranker::{EmbeddingReranker, Reranker};
pub use types::{ChatMessage, ChatRequest};
