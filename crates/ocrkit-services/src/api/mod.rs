//! REST API for serving a trained model.
//!
//! All routes live under `/api/v1`. Recognition runs on the blocking
//! thread pool so slow handlers never stall the async runtime.

pub mod generate;
pub mod handlers;
pub mod ocr;
pub mod stats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ocrkit_core::HandlerRegistry;
use ocrkit_core::pipeline::InferenceOrchestrator;

use stats::ServiceStats;

/// Shared state accessible by all API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Loaded pipeline, shared by every request.
    pub pipeline: Arc<InferenceOrchestrator>,
    /// Registry the pipeline was resolved from, for introspection.
    pub registry: Arc<HandlerRegistry>,
    /// Model the pipeline was loaded from.
    pub model_path: PathBuf,
    pub stats: Arc<ServiceStats>,
    pub started: Instant,
}

impl ApiState {
    pub fn new(
        pipeline: Arc<InferenceOrchestrator>,
        registry: Arc<HandlerRegistry>,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            model_path: model_path.into(),
            stats: Arc::new(ServiceStats::default()),
            started: Instant::now(),
        }
    }

    /// Seconds since the state was created.
    pub fn uptime(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

async fn count_requests(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    state.stats.record_request();
    next.run(request).await
}

/// Build the API router with all routes.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .nest("/api/v1", handlers::api_routes())
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
