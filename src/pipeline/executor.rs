//! Drives one run's stages to completion or failure.
//!
//! Each executor owns its run exclusively: it is the only writer of the
//! run's status, progress, and logs. The caller that started the run never
//! sees errors from here; they land in the run's log and terminal status.

use std::sync::Arc;

use crate::chunker::Chunker;
use crate::crawler::{page_slug, CrawlEvent, CrawledPage, SiteCrawler};
use crate::llm::LlmProvider;
use crate::rag::{ChunkRecord, VectorStore};
use crate::runs::{Run, RunRegistry, RunStatus};

use super::{PipelineError, Stage};

#[derive(Clone)]
pub struct PipelineExecutor {
    registry: RunRegistry,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    crawler: SiteCrawler,
    chunker: Chunker,
    max_consecutive_page_failures: u32,
}

impl PipelineExecutor {
    pub fn new(
        registry: RunRegistry,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        crawler: SiteCrawler,
        chunker: Chunker,
        max_consecutive_page_failures: u32,
    ) -> Self {
        Self {
            registry,
            store,
            llm,
            crawler,
            chunker,
            max_consecutive_page_failures,
        }
    }

    /// Run the pipeline in a background task and return immediately.
    pub fn spawn(&self, run: Run) {
        let executor = self.clone();
        tokio::spawn(async move {
            executor.execute(run).await;
        });
    }

    /// Drive the run to a terminal state. Public so tests can await the
    /// whole pipeline deterministically.
    pub async fn execute(&self, run: Run) {
        let run_id = run.run_id.clone();

        match self.run_stages(&run).await {
            Ok(indexed) => {
                let _ = self.registry.append_log(
                    &run_id,
                    format!("Pipeline completed successfully | {} pages indexed", indexed),
                );
                let _ = self.registry.advance_progress(
                    &run_id,
                    "completed",
                    Stage::TOTAL_STEPS,
                    Stage::TOTAL_STEPS,
                );
                let _ = self.registry.set_status(&run_id, RunStatus::Completed);
                tracing::info!("Run {} completed ({} pages)", run_id, indexed);
            }
            Err(err) => {
                let _ = self
                    .registry
                    .append_log(&run_id, format!("Pipeline failed: {}", err));
                let _ = self.registry.set_status(&run_id, RunStatus::Failed);
                tracing::error!("Run {} failed: {}", run_id, err);
            }
        }
    }

    async fn run_stages(&self, run: &Run) -> Result<u32, PipelineError> {
        let run_id = &run.run_id;

        let stage = Stage::Initialize;
        self.advance(run_id, stage);
        self.log(run_id, format!("Starting pipeline | run_id: {}", run_id));
        self.log(run_id, format!("Site: {}", run.site_name));
        self.log(
            run_id,
            format!(
                "Start URL: {} | max_depth: {} | max_pages: {}",
                run.start_url, run.max_depth, run.max_pages
            ),
        );

        let stage = Stage::StorageSetup;
        self.advance(run_id, stage);
        self.log(run_id, format!("Creating collection {}", run.collection));
        if let Err(err) = self.store.ensure_collection(&run.collection).await {
            // Leave no partial collection behind the failed run record.
            let _ = self.store.delete_collection(&run.collection).await;
            return Err(PipelineError::StorageSetup(err.to_string()));
        }
        self.log(run_id, format!("Collection {} ready", run.collection));

        let stage = Stage::CrawlIndex;
        self.advance(run_id, stage);

        let mut events =
            self.crawler
                .stream(run.start_url.clone(), run.max_depth, run.max_pages);

        let mut indexed = 0u32;
        let mut total_chunks = 0usize;
        let mut consecutive_failures = 0u32;

        while let Some(event) = events.recv().await {
            match event {
                CrawlEvent::Page(page) => match self.index_page(run, &page).await {
                    Ok(chunk_count) => {
                        indexed += 1;
                        total_chunks += chunk_count;
                        consecutive_failures = 0;
                        self.log(
                            run_id,
                            format!(
                                "[{}/{}] {} (depth={}, chunks={})",
                                indexed, run.max_pages, page.url, page.depth, chunk_count
                            ),
                        );
                    }
                    Err(message) => {
                        consecutive_failures += 1;
                        self.log(run_id, format!("[ERR] {}: {}", page.url, message));
                    }
                },
                CrawlEvent::PageError { url, message } => {
                    consecutive_failures += 1;
                    self.log(run_id, format!("[ERR] {}: {}", url, message));
                }
                CrawlEvent::Fatal { message } => {
                    return Err(PipelineError::Extractor(message));
                }
            }

            if consecutive_failures >= self.max_consecutive_page_failures {
                return Err(PipelineError::ConsecutiveFailures {
                    limit: self.max_consecutive_page_failures,
                });
            }
        }

        self.log(
            run_id,
            format!(
                "Crawl finished: {} pages indexed, {} chunks stored",
                indexed, total_chunks
            ),
        );

        Ok(indexed)
    }

    /// Chunk, embed and upsert one page. Failures here are per-page: the
    /// caller logs them and moves on.
    async fn index_page(&self, run: &Run, page: &CrawledPage) -> Result<usize, String> {
        let chunks = self.chunker.split(&page.text);
        if chunks.is_empty() {
            return Ok(0);
        }

        let inputs: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.llm.embed(&inputs).await.map_err(|e| e.to_string())?;

        let slug = page_slug(&page.url);
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord {
                chunk_id: format!("{}_{}", slug, chunk.chunk_index),
                url: page.url.clone(),
                title: page.title.clone(),
                text: chunk.text,
                chunk_index: chunk.chunk_index,
                embedding,
            })
            .collect();

        let count = records.len();
        self.store
            .upsert_batch(&run.collection, records)
            .await
            .map_err(|e| e.to_string())?;

        Ok(count)
    }

    fn advance(&self, run_id: &str, stage: Stage) {
        let _ = self
            .registry
            .advance_progress(run_id, stage.title(), stage.index(), Stage::TOTAL_STEPS);
    }

    fn log(&self, run_id: &str, line: String) {
        let _ = self.registry.append_log(run_id, line);
    }
}
