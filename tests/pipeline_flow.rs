//! End-to-end run lifecycle (start, poll, answer, delete) against
//! in-memory page and model capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sitechat_backend::chunker::Chunker;
use sitechat_backend::core::config::settings::ChunkerSettings;
use sitechat_backend::core::config::Settings;
use sitechat_backend::core::errors::ApiError;
use sitechat_backend::crawler::{PageFetcher, SiteCrawler};
use sitechat_backend::llm::{ChatRequest, EmbeddingReranker, LlmProvider};
use sitechat_backend::pipeline::PipelineExecutor;
use sitechat_backend::rag::engine::FALLBACK_ANSWER;
use sitechat_backend::rag::{AnswerEngine, SqliteVectorStore, VectorStore};
use sitechat_backend::runs::{Run, RunLimits, RunParams, RunRegistry, RunStatus};

struct FixtureFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ApiError::upstream("fetch", format!("no route to {}", url)))
    }
}

/// Deterministic keyword-presence embeddings plus a context-echoing
/// generator, so retrieval quality is observable without real models.
struct KeywordLlm {
    chat_calls: AtomicUsize,
}

impl KeywordLlm {
    fn new() -> Self {
        Self {
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn embedding_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let keywords = ["acme", "consulting", "support", "offer", "pricing"];
        let mut vector: Vec<f32> = keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        vector.push(1.0);
        vector
    }
}

#[async_trait]
impl LlmProvider for KeywordLlm {
    fn name(&self) -> &str {
        "keyword-stub"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);

        let context = request
            .messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let mut offered = Vec::new();
        for service in ["consulting", "support"] {
            if context.contains(service) {
                offered.push(service);
            }
        }

        if offered.is_empty() {
            Ok("The context does not say.".to_string())
        } else {
            Ok(format!("We offer {}.", offered.join(" and ")))
        }
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|t| Self::embedding_for(t)).collect())
    }
}

struct Harness {
    registry: RunRegistry,
    store: Arc<SqliteVectorStore>,
    llm: Arc<KeywordLlm>,
    executor: PipelineExecutor,
    engine: AnswerEngine,
    _scratch: tempfile::TempDir,
}

async fn harness(pages: HashMap<String, String>) -> Harness {
    let scratch = tempfile::tempdir().unwrap();

    let registry = RunRegistry::new(
        scratch.path().join("runs.json"),
        RunLimits {
            max_depth: 5,
            max_pages: 100,
        },
    );
    let store = Arc::new(
        SqliteVectorStore::new(scratch.path().join("chunks.db"))
            .await
            .unwrap(),
    );
    let llm = Arc::new(KeywordLlm::new());
    let reranker = Arc::new(EmbeddingReranker::new(llm.clone()));

    let executor = PipelineExecutor::new(
        registry.clone(),
        store.clone(),
        llm.clone(),
        SiteCrawler::new(Arc::new(FixtureFetcher { pages })),
        Chunker::new(ChunkerSettings::default()),
        5,
    );
    let engine = AnswerEngine::new(
        registry.clone(),
        store.clone(),
        llm.clone(),
        reranker,
        Settings::default(),
    );

    Harness {
        registry,
        store,
        llm,
        executor,
        engine,
        _scratch: scratch,
    }
}

fn acme_site() -> HashMap<String, String> {
    let mut pages = HashMap::new();
    pages.insert(
        "https://acme.test/".to_string(),
        r#"<title>Acme</title>
           <p>Welcome to Acme. Acme offers consulting and support.</p>
           <a href="/pricing">Pricing</a>"#
            .to_string(),
    );
    pages.insert(
        "https://acme.test/pricing".to_string(),
        "<title>Pricing</title><p>Pricing starts at ten dollars per month.</p>".to_string(),
    );
    pages
}

fn start_params() -> RunParams {
    RunParams {
        start_url: "https://acme.test/".to_string(),
        max_depth: 1,
        max_pages: 5,
    }
}

async fn run_to_completion(h: &Harness, run: Run) -> Run {
    h.executor.execute(run.clone()).await;
    h.registry.get(&run.run_id)
}

#[tokio::test]
async fn full_run_then_answer_round_trip() {
    let h = harness(acme_site()).await;

    let run = h.registry.create(start_params()).unwrap();
    let finished = run_to_completion(&h, run).await;

    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(finished.progress.current_step, 3);
    assert_eq!(finished.progress.total_steps, 3);
    assert!(finished.end_time.is_some());
    assert!(h.store.count(&finished.collection).await.unwrap() >= 2);

    let response = h
        .engine
        .answer(&finished.run_id, "what does Acme offer?", 3)
        .await
        .unwrap();

    assert!(
        response.answer.contains("consulting") || response.answer.contains("support"),
        "unexpected answer: {}",
        response.answer
    );
    assert!(!response.sources.is_empty());
    assert!(response
        .sources
        .iter()
        .any(|s| s.url == "https://acme.test/"));
}

#[tokio::test]
async fn run_ids_are_unique_and_status_starts_running() {
    let h = harness(acme_site()).await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..10 {
        let run = h.registry.create(start_params()).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(seen.insert(run.run_id));
    }
}

#[tokio::test]
async fn unknown_run_polls_as_not_found() {
    let h = harness(acme_site()).await;
    let run = h.registry.get("20200101_000000_0001");
    assert_eq!(run.status, RunStatus::NotFound);
}

#[tokio::test]
async fn polling_observes_monotonic_progress_and_append_only_logs() {
    let h = harness(acme_site()).await;

    let run = h.registry.create(start_params()).unwrap();
    h.executor.spawn(run.clone());

    let mut last_step = 0;
    let mut last_logs: Vec<String> = Vec::new();

    for _ in 0..500 {
        let snapshot = h.registry.get(&run.run_id);

        assert!(snapshot.progress.current_step >= last_step);
        assert!(snapshot.progress.current_step <= snapshot.progress.total_steps);
        assert!(snapshot.logs.len() >= last_logs.len());
        assert_eq!(&snapshot.logs[..last_logs.len()], &last_logs[..]);

        last_step = snapshot.progress.current_step;
        last_logs = snapshot.logs;

        if snapshot.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let finished = h.registry.get(&run.run_id);
    assert_eq!(finished.status, RunStatus::Completed);
}

#[tokio::test]
async fn answer_against_running_run_is_rejected() {
    let h = harness(acme_site()).await;

    // Created but never executed: stays in running state.
    let run = h.registry.create(start_params()).unwrap();
    let err = h.engine.answer(&run.run_id, "anything", 3).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn delete_lifecycle_conflicts_then_succeeds_then_idempotent() {
    let h = harness(acme_site()).await;

    let run = h.registry.create(start_params()).unwrap();
    assert!(matches!(
        h.registry.delete(&run.run_id),
        Err(ApiError::Conflict(_))
    ));

    let finished = run_to_completion(&h, run).await;
    assert_eq!(finished.status, RunStatus::Completed);

    let removed = h.registry.delete(&finished.run_id).unwrap().unwrap();
    h.store.delete_collection(&removed.collection).await.unwrap();

    assert_eq!(h.registry.get(&finished.run_id).status, RunStatus::NotFound);
    assert!(h
        .store
        .search(&removed.collection, &[1.0], 3)
        .await
        .is_err());

    // Deleting again reports not-found rather than an error.
    assert!(h.registry.delete(&finished.run_id).unwrap().is_none());
}

#[tokio::test]
async fn empty_index_returns_fallback_without_calling_generator() {
    let mut pages = HashMap::new();
    pages.insert(
        "https://acme.test/".to_string(),
        "<html><body></body></html>".to_string(),
    );
    let h = harness(pages).await;

    let run = h.registry.create(start_params()).unwrap();
    let finished = run_to_completion(&h, run).await;
    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(h.store.count(&finished.collection).await.unwrap(), 0);

    let response = h
        .engine
        .answer(&finished.run_id, "what does Acme offer?", 3)
        .await
        .unwrap();

    assert_eq!(response.answer, FALLBACK_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn runs_are_isolated_per_collection() {
    let h = harness(acme_site()).await;

    let first = h.registry.create(start_params()).unwrap();
    let first = run_to_completion(&h, first).await;

    let second = h.registry.create(start_params()).unwrap();
    let second = run_to_completion(&h, second).await;

    assert_ne!(first.collection, second.collection);

    let first_count = h.store.count(&first.collection).await.unwrap();
    let second_count = h.store.count(&second.collection).await.unwrap();
    assert!(first_count > 0);
    assert_eq!(first_count, second_count);

    // Dropping one run's collection leaves the other answerable.
    let removed = h.registry.delete(&first.run_id).unwrap().unwrap();
    h.store.delete_collection(&removed.collection).await.unwrap();

    let response = h
        .engine
        .answer(&second.run_id, "what does Acme offer?", 3)
        .await
        .unwrap();
    assert!(!response.sources.is_empty());
}
