use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok"
    }))
}

/// Capability/health report for the dashboard: which collaborators are
/// reachable and which collections exist.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let collections = match state.store.list_collections().await {
        Ok(names) => Some(names),
        Err(err) => {
            tracing::warn!("Vector store unavailable for status report: {}", err);
            None
        }
    };

    let llm_configured = state.llm.health_check().await.unwrap_or(false);

    Ok(Json(json!({
        "server": "running",
        "vector_store_configured": collections.is_some(),
        "llm_configured": llm_configured,
        "llm_provider": state.llm.name(),
        "collections": collections.unwrap_or_default()
    })))
}
