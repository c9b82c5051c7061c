//! Run tracking: one `Run` per crawl-and-index job.

pub mod registry;

pub use registry::{RunLimits, RunRegistry};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    /// Query-time sentinel for unknown or deleted runs; never persisted.
    NotFound,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub step: String,
    pub current_step: u32,
    pub total_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    pub start_url: String,
    pub max_depth: u32,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub status: RunStatus,
    pub start_url: String,
    pub max_depth: u32,
    pub max_pages: u32,
    pub site_name: String,
    pub progress: RunProgress,
    pub logs: Vec<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub collection: String,
}

impl Run {
    /// Sentinel returned for unknown ids so pollers never hit an error path.
    pub fn not_found(run_id: &str) -> Self {
        Run {
            run_id: run_id.to_string(),
            status: RunStatus::NotFound,
            start_url: String::new(),
            max_depth: 0,
            max_pages: 0,
            site_name: String::new(),
            progress: RunProgress {
                step: "not_found".to_string(),
                current_step: 0,
                total_steps: 0,
            },
            logs: vec!["Run not found".to_string()],
            start_time: None,
            end_time: None,
            collection: String::new(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            site_name: self.site_name.clone(),
            start_url: self.start_url.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub site_name: String,
    pub start_url: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Deterministic, collision-free collection name for a run.
pub fn collection_name(run_id: &str) -> String {
    let sanitized: String = run_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("run_{}", sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_deterministic_and_sanitized() {
        assert_eq!(collection_name("20250101_120000_0001"), "run_20250101_120000_0001");
        assert_eq!(
            collection_name("20250101_120000_0001"),
            collection_name("20250101_120000_0001")
        );
        assert!(collection_name("a.b/c").chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn not_found_sentinel_has_empty_progress() {
        let run = Run::not_found("missing");
        assert_eq!(run.status, RunStatus::NotFound);
        assert_eq!(run.progress.total_steps, 0);
    }
}
