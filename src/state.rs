use std::sync::Arc;

use crate::chunker::Chunker;
use crate::core::config::{AppPaths, Settings};
use crate::core::security::ApiKey;
use crate::crawler::{HttpFetcher, SiteCrawler};
use crate::llm::{EmbeddingReranker, LlmProvider, OpenAiHttpProvider, Reranker};
use crate::pipeline::PipelineExecutor;
use crate::rag::{AnswerEngine, SqliteVectorStore, VectorStore};
use crate::runs::{RunLimits, RunRegistry};

/// Global application state shared across all routes and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub api_key: ApiKey,
    pub registry: RunRegistry,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub executor: PipelineExecutor,
    pub engine: AnswerEngine,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let settings = Settings::load(&paths);
        let api_key = ApiKey::from_env();

        let registry = RunRegistry::new(
            paths.runs_path.clone(),
            RunLimits {
                max_depth: settings.crawler.max_depth_limit,
                max_pages: settings.crawler.max_pages_limit,
            },
        );

        let store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(paths.vector_db_path.clone()).await?);

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiHttpProvider::new(&settings.llm)?);
        let reranker: Arc<dyn Reranker> = Arc::new(EmbeddingReranker::new(llm.clone()));

        let fetcher = Arc::new(HttpFetcher::new(&settings.crawler)?);
        let crawler = SiteCrawler::new(fetcher);
        let chunker = Chunker::new(settings.chunker.clone());

        let executor = PipelineExecutor::new(
            registry.clone(),
            store.clone(),
            llm.clone(),
            crawler,
            chunker,
            settings.pipeline.max_consecutive_page_failures,
        );

        let engine = AnswerEngine::new(
            registry.clone(),
            store.clone(),
            llm.clone(),
            reranker,
            settings.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            settings,
            api_key,
            registry,
            store,
            llm,
            executor,
            engine,
        }))
    }
}
