//! Typed runtime settings.
//!
//! Loaded from `config.yml` at the project root (or `SITECHAT_CONFIG_PATH`);
//! every field has a default so a missing or partial file is fine.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crawler: CrawlerSettings,
    pub chunker: ChunkerSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Upper bound accepted for a run's max_depth parameter.
    pub max_depth_limit: u32,
    /// Upper bound accepted for a run's max_pages parameter.
    pub max_pages_limit: u32,
    pub fetch_timeout_secs: u64,
    /// Outbound page fetches per second.
    pub requests_per_sec: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerSettings {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Maximum chunks taken from a single page.
    pub max_chunks_per_page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidate set size is top_k * candidate_multiplier.
    pub candidate_multiplier: usize,
    /// Raw-similarity floor below which candidates are dropped.
    pub score_floor: f32,
    /// Character budget for the grounding prompt context.
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
    pub max_answer_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Consecutive page failures that escalate a run to failed.
    pub max_consecutive_page_failures: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crawler: CrawlerSettings::default(),
            chunker: ChunkerSettings::default(),
            retrieval: RetrievalSettings::default(),
            llm: LlmSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            max_depth_limit: 5,
            max_pages_limit: 500,
            fetch_timeout_secs: 30,
            requests_per_sec: 4,
        }
    }
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            max_chunks_per_page: 40,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            candidate_multiplier: 4,
            score_floor: 0.05,
            max_context_chars: 8000,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8088".to_string(),
            chat_model: "default".to_string(),
            embedding_model: "default-embedding".to_string(),
            request_timeout_secs: 60,
            max_answer_tokens: 600,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_consecutive_page_failures: 5,
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Self {
        let path = config_path(paths);
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<Settings>(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    tracing::warn!("Invalid config at {}: {}; using defaults", path.display(), err);
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("Failed to read {}: {}; using defaults", path.display(), err);
                Self::default()
            }
        }
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("SITECHAT_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    paths.project_root.join("config.yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.chunker.chunk_overlap < settings.chunker.chunk_size);
        assert!(settings.retrieval.candidate_multiplier >= 3);
        assert!(settings.pipeline.max_consecutive_page_failures > 0);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let settings: Settings =
            serde_yaml::from_str("crawler:\n  max_pages_limit: 25\n").unwrap();
        assert_eq!(settings.crawler.max_pages_limit, 25);
        assert_eq!(settings.chunker.chunk_size, 500);
    }
}
