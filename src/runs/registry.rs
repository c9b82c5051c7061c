//! The registry is the single authoritative store for run state.
//!
//! Many readers poll it; each run has exactly one writer (its executor).
//! Contents are persisted to a JSON file after every mutation and loaded
//! at startup, so run history survives restarts.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use url::Url;

use super::{collection_name, Run, RunParams, RunProgress, RunStatus, RunSummary};
use crate::core::errors::ApiError;

/// Bounds accepted for run parameters, taken from crawler settings.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_depth: u32,
    pub max_pages: u32,
}

struct RegistryData {
    runs: HashMap<String, Run>,
    id_counter: u64,
}

#[derive(Clone)]
pub struct RunRegistry {
    inner: Arc<Mutex<RegistryData>>,
    runs_path: PathBuf,
    limits: RunLimits,
}

impl RunRegistry {
    pub fn new(runs_path: PathBuf, limits: RunLimits) -> Self {
        let mut runs = load_runs(&runs_path);

        // An executor does not outlive the process; anything still marked
        // running at load time can never finish.
        for run in runs.values_mut() {
            if run.status == RunStatus::Running {
                run.status = RunStatus::Failed;
                run.end_time = Some(now());
                run.logs
                    .push("Run interrupted by server restart".to_string());
            }
        }

        let registry = Self {
            inner: Arc::new(Mutex::new(RegistryData { runs, id_counter: 0 })),
            runs_path,
            limits,
        };
        let _ = registry.save();
        registry
    }

    pub fn create(&self, params: RunParams) -> Result<Run, ApiError> {
        let site_name = validate_params(&params, self.limits)?;

        let mut guard = self.inner.lock().map_err(ApiError::internal)?;
        let run_id = loop {
            guard.id_counter += 1;
            let candidate = format!(
                "{}_{:04}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                guard.id_counter % 10_000
            );
            if !guard.runs.contains_key(&candidate) {
                break candidate;
            }
        };

        let run = Run {
            run_id: run_id.clone(),
            status: RunStatus::Running,
            start_url: params.start_url,
            max_depth: params.max_depth,
            max_pages: params.max_pages,
            site_name,
            progress: RunProgress {
                step: "starting".to_string(),
                current_step: 0,
                total_steps: 3,
            },
            logs: vec!["Pipeline started".to_string()],
            start_time: Some(now()),
            end_time: None,
            collection: collection_name(&run_id),
        };

        guard.runs.insert(run_id, run.clone());
        drop(guard);
        self.save()?;
        Ok(run)
    }

    /// Snapshot lookup; unknown ids yield the `not_found` sentinel.
    pub fn get(&self, run_id: &str) -> Run {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(_) => return Run::not_found(run_id),
        };
        guard
            .runs
            .get(run_id)
            .cloned()
            .unwrap_or_else(|| Run::not_found(run_id))
    }

    pub fn append_log(&self, run_id: &str, line: impl Into<String>) -> Result<(), ApiError> {
        let mut guard = self.inner.lock().map_err(ApiError::internal)?;
        if let Some(run) = guard.runs.get_mut(run_id) {
            run.logs.push(line.into());
        }
        drop(guard);
        self.save()
    }

    pub fn advance_progress(
        &self,
        run_id: &str,
        step: &str,
        current_step: u32,
        total_steps: u32,
    ) -> Result<(), ApiError> {
        let mut guard = self.inner.lock().map_err(ApiError::internal)?;
        if let Some(run) = guard.runs.get_mut(run_id) {
            let current = current_step.min(total_steps);
            if current >= run.progress.current_step {
                run.progress = RunProgress {
                    step: step.to_string(),
                    current_step: current,
                    total_steps,
                };
            }
        }
        drop(guard);
        self.save()
    }

    /// Terminal transitions set `end_time` exactly once.
    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<(), ApiError> {
        let mut guard = self.inner.lock().map_err(ApiError::internal)?;
        if let Some(run) = guard.runs.get_mut(run_id) {
            run.status = status;
            if status.is_terminal() && run.end_time.is_none() {
                run.end_time = Some(now());
            }
        }
        drop(guard);
        self.save()
    }

    /// Run ids, most recent first.
    pub fn list(&self) -> Result<Vec<String>, ApiError> {
        let guard = self.inner.lock().map_err(ApiError::internal)?;
        let mut ids: Vec<String> = guard.runs.keys().cloned().collect();
        ids.sort_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Run summaries, most recent first.
    pub fn history(&self) -> Result<Vec<RunSummary>, ApiError> {
        let guard = self.inner.lock().map_err(ApiError::internal)?;
        let mut summaries: Vec<RunSummary> = guard.runs.values().map(Run::summary).collect();
        summaries.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(summaries)
    }

    /// Remove a run record. Returns the removed run so the caller can drop
    /// its collection; `Ok(None)` for ids that are already gone, which keeps
    /// repeated deletes idempotent.
    pub fn delete(&self, run_id: &str) -> Result<Option<Run>, ApiError> {
        let mut guard = self.inner.lock().map_err(ApiError::internal)?;
        match guard.runs.get(run_id) {
            Some(run) if run.status == RunStatus::Running => {
                return Err(ApiError::Conflict(format!(
                    "Run {} is still running",
                    run_id
                )));
            }
            Some(_) => {}
            None => return Ok(None),
        }

        let removed = guard.runs.remove(run_id);
        drop(guard);
        self.save()?;
        Ok(removed)
    }

    fn save(&self) -> Result<(), ApiError> {
        if let Some(parent) = self.runs_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let guard = self.inner.lock().map_err(ApiError::internal)?;
        let data = serde_json::to_string_pretty(&guard.runs).map_err(ApiError::internal)?;
        fs::write(&self.runs_path, data).map_err(ApiError::internal)?;
        Ok(())
    }
}

fn validate_params(params: &RunParams, limits: RunLimits) -> Result<String, ApiError> {
    let url = Url::parse(&params.start_url)
        .map_err(|e| ApiError::BadRequest(format!("Invalid start_url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!(
            "start_url must be http(s), got {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ApiError::BadRequest("start_url has no host".to_string()))?;

    if params.max_depth > limits.max_depth {
        return Err(ApiError::BadRequest(format!(
            "max_depth {} exceeds limit {}",
            params.max_depth, limits.max_depth
        )));
    }
    if params.max_pages == 0 || params.max_pages > limits.max_pages {
        return Err(ApiError::BadRequest(format!(
            "max_pages must be in 1..={}",
            limits.max_pages
        )));
    }

    Ok(host.to_string())
}

fn load_runs(path: &PathBuf) -> HashMap<String, Run> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str(&contents).unwrap_or_default()
}

fn now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
