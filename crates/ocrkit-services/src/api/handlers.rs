//! HTTP request handlers for the REST API.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use ocrkit_core::CORE_VERSION;
use ocrkit_plugin::HandlerInfo;

use super::ApiState;

/// Build all API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/handlers/info", get(handlers_info))
        // Recognition
        .merge(super::ocr::ocr_routes())
        .merge(super::generate::generate_routes())
        // Counters
        .merge(super::stats::stats_routes())
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    model_loaded: bool,
    version: &'static str,
    uptime: f64,
    handler_versions: std::collections::BTreeMap<String, String>,
}

async fn health_check(State(state): State<ApiState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        model_loaded: true,
        version: CORE_VERSION,
        uptime: state.uptime(),
        handler_versions: state.pipeline.handler_versions().clone(),
    })
}

async fn handlers_info(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let handlers: Vec<&HandlerInfo> = state.registry.list(None).map(|d| d.info()).collect();
    Json(serde_json::json!({
        "model_loaded": true,
        "pipeline_ready": true,
        "handlers_info": {
            "config": {
                "preprocess_handler": state.pipeline.preprocess_id(),
                "ocr_handler": state.pipeline.infer_id(),
                "model_path": state.model_path.display().to_string(),
            },
            "handlers": handlers,
        }
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "detail": format!("no route for {}", uri.path()),
            "error_code": "NOT_FOUND",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}
