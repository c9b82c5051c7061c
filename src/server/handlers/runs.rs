use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::runs::RunParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartPipelineRequest {
    pub start_url: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> u32 {
    50
}

pub async fn start_pipeline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<StartPipelineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    let run = state.registry.create(RunParams {
        start_url: payload.start_url,
        max_depth: payload.max_depth,
        max_pages: payload.max_pages,
    })?;

    // Fire and forget; progress is observable via the status endpoint.
    state.executor.spawn(run.clone());

    Ok(Json(json!({
        "run_id": run.run_id,
        "message": format!("Pipeline started with run_id: {}", run.run_id),
        "status": "started"
    })))
}

pub async fn get_pipeline_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    // Unknown ids get the not_found sentinel so pollers can keep polling.
    Ok(Json(state.registry.get(&run_id)))
}

pub async fn list_pipelines(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let pipelines = state.registry.list()?;
    Ok(Json(json!({ "pipelines": pipelines })))
}

pub async fn get_pipeline_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let history = state.registry.history()?;
    Ok(Json(json!({ "history": history })))
}

pub async fn delete_pipeline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    if let Some(run) = state.registry.delete(&run_id)? {
        if let Err(err) = state.store.delete_collection(&run.collection).await {
            tracing::warn!(
                "Failed to drop collection {} for deleted run {}: {}",
                run.collection,
                run_id,
                err
            );
        }
    }

    Ok(Json(json!({
        "message": format!("Pipeline {} deleted", run_id)
    })))
}
