use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{answer, health, runs};
use crate::state::AppState;

/// Creates the application router: health endpoints, pipeline lifecycle,
/// and the answer endpoint, behind CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/status", get(health::get_status))
        .route("/pipeline/start", post(runs::start_pipeline))
        .route("/pipeline/list", get(runs::list_pipelines))
        .route("/pipeline/history", get(runs::get_pipeline_history))
        .route("/pipeline/status/:run_id", get(runs::get_pipeline_status))
        .route("/pipeline/:run_id", delete(runs::delete_pipeline))
        .route("/answer", post(answer::answer))
        .with_state(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
