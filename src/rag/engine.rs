//! Retrieval & answer engine.
//!
//! Turns a question plus a run id into a ranked set of passages and a
//! grounded answer with source attribution. Reads only the queried run's
//! collection; a run that is not `completed` is rejected rather than
//! answered from partial data.

use std::sync::Arc;

use serde::Serialize;

use super::query::{extract_query_terms, keyword_gate};
use super::store::{ScoredChunk, VectorStore};
use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, Reranker};
use crate::runs::{RunRegistry, RunStatus};

pub const FALLBACK_ANSWER: &str =
    "No relevant information was found for this question in the indexed site.";

/// Passage text handed to the reranker is capped to keep scoring cheap.
const RERANK_TEXT_CHARS: usize = 1200;

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Clone)]
pub struct AnswerEngine {
    registry: RunRegistry,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    reranker: Arc<dyn Reranker>,
    settings: Settings,
}

impl AnswerEngine {
    pub fn new(
        registry: RunRegistry,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        reranker: Arc<dyn Reranker>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            store,
            llm,
            reranker,
            settings,
        }
    }

    pub async fn answer(
        &self,
        run_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<AnswerResponse, ApiError> {
        let run = self.registry.get(run_id);
        match run.status {
            RunStatus::Completed => {}
            RunStatus::NotFound => {
                return Err(ApiError::NotFound(format!("Run {} does not exist", run_id)));
            }
            status => {
                return Err(ApiError::NotFound(format!(
                    "Run {} is not ready for queries (status: {:?})",
                    run_id, status
                )));
            }
        }

        let top_k = top_k.max(1);

        let query_embedding = self
            .llm
            .embed(&[query.to_string()])
            .await
            .map_err(tag_upstream("embedding"))?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::upstream("embedding", "no embedding returned"))?;

        let candidate_k = top_k * self.settings.retrieval.candidate_multiplier;
        let candidates = self
            .store
            .search(&run.collection, &query_embedding, candidate_k)
            .await
            .map_err(|err| match err {
                ApiError::NotFound(msg) => ApiError::NotFound(msg),
                other => ApiError::upstream("vector_store", other),
            })?;

        let floor = self.settings.retrieval.score_floor;
        let candidates: Vec<ScoredChunk> =
            candidates.into_iter().filter(|c| c.score >= floor).collect();

        let terms = extract_query_terms(query);
        let candidates = keyword_gate(candidates, &terms, |c| c.text.as_str());

        let ranked = self.rerank(query, candidates).await?;
        let top: Vec<(ScoredChunk, f32)> = ranked.into_iter().take(top_k).collect();

        if top.is_empty() {
            return Ok(AnswerResponse {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = self.build_prompt(&run.site_name, query, &top);
        let answer = self
            .llm
            .chat(prompt)
            .await
            .map_err(tag_upstream("generation"))?;

        let answer = if answer.trim().is_empty() {
            FALLBACK_ANSWER.to_string()
        } else {
            answer
        };

        Ok(AnswerResponse {
            answer,
            sources: dedupe_sources(&top),
        })
    }

    /// Rerank candidates, preserving the similarity order for equal scores
    /// (stable sort over a similarity-ordered input).
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
    ) -> Result<Vec<(ScoredChunk, f32)>, ApiError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<String> = candidates
            .iter()
            .map(|c| c.text.chars().take(RERANK_TEXT_CHARS).collect())
            .collect();

        let scores = self
            .reranker
            .rerank(query, &passages)
            .await
            .map_err(tag_upstream("reranking"))?;

        if scores.len() != candidates.len() {
            return Err(ApiError::upstream(
                "reranking",
                format!(
                    "score count mismatch: {} != {}",
                    scores.len(),
                    candidates.len()
                ),
            ));
        }

        let mut ranked: Vec<(ScoredChunk, f32)> =
            candidates.into_iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    fn build_prompt(
        &self,
        site_name: &str,
        query: &str,
        passages: &[(ScoredChunk, f32)],
    ) -> ChatRequest {
        let budget = self.settings.retrieval.max_context_chars;
        let mut context = String::new();
        for (chunk, _) in passages {
            let block = format!("[Source: {}]\n{}\n\n", chunk.url, chunk.text);
            if !context.is_empty() && context.chars().count() + block.chars().count() > budget {
                break;
            }
            context.push_str(&block);
        }

        let system = format!(
            "You are the voice of the organization represented by {}. \
             Whenever a user says 'you', it refers to this organization. \
             Respond in first-person plural. Only use the provided context; \
             if the answer is not in the context, say so.",
            site_name
        );
        let user = format!("Context:\n{}\nQuestion: {}\n\nAnswer:", context, query);

        let mut request = ChatRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ]);
        request.temperature = Some(0.0);
        request.max_tokens = Some(self.settings.llm.max_answer_tokens as i32);
        request
    }
}

fn tag_upstream(stage: &'static str) -> impl Fn(ApiError) -> ApiError {
    move |err| match err {
        ApiError::Upstream { .. } => err,
        other => ApiError::upstream(stage, other),
    }
}

/// First (highest-scoring) occurrence per URL wins; rank order preserved.
fn dedupe_sources(ranked: &[(ScoredChunk, f32)]) -> Vec<SourceRef> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for (chunk, score) in ranked {
        if seen.insert(chunk.url.clone()) {
            sources.push(SourceRef {
                url: chunk.url.clone(),
                title: chunk.title.clone(),
                score: *score,
            });
        }
    }
    sources
}
