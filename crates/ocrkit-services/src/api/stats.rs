//! Request counters behind `/api/v1/stats`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use super::ApiState;

pub fn stats_routes() -> Router<ApiState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/stats/reset", post(reset))
}

#[derive(Debug)]
struct Counters {
    total_requests: u64,
    ocr_requests: u64,
    ocr_successes: u64,
    generate_requests: u64,
    processing: Duration,
    since: Instant,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            total_requests: 0,
            ocr_requests: 0,
            ocr_successes: 0,
            generate_requests: 0,
            processing: Duration::ZERO,
            since: Instant::now(),
        }
    }
}

/// Service-wide counters.
#[derive(Debug, Default)]
pub struct ServiceStats {
    inner: Mutex<Counters>,
}

/// Counter snapshot as served by `GET /api/v1/stats`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub ocr_requests: u64,
    pub generate_requests: u64,
    /// Fraction of recognition requests that succeeded, `0.0` before any.
    pub success_rate: f64,
    /// Mean seconds per recognition request.
    pub average_processing_time: f64,
    /// Seconds since the counters were last reset.
    pub uptime: f64,
    pub requests_per_minute: f64,
}

impl ServiceStats {
    fn with<T>(&self, f: impl FnOnce(&mut Counters) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    /// Count one request of any kind.
    pub fn record_request(&self) {
        self.with(|c| c.total_requests += 1);
    }

    /// Count one finished recognition request.
    pub fn record_ocr(&self, success: bool, elapsed: Duration) {
        self.with(|c| {
            c.ocr_requests += 1;
            if success {
                c.ocr_successes += 1;
            }
            c.processing += elapsed;
        });
    }

    /// Count one `/generate` request.
    pub fn record_generate(&self) {
        self.with(|c| c.generate_requests += 1);
    }

    pub fn reset(&self) {
        self.with(|c| *c = Counters::default());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.with(|c| {
            let uptime = c.since.elapsed().as_secs_f64();
            let (success_rate, average_processing_time) = if c.ocr_requests == 0 {
                (0.0, 0.0)
            } else {
                let n = c.ocr_requests as f64;
                (
                    c.ocr_successes as f64 / n,
                    c.processing.as_secs_f64() / n,
                )
            };
            let minutes = uptime / 60.0;
            StatsSnapshot {
                total_requests: c.total_requests,
                ocr_requests: c.ocr_requests,
                generate_requests: c.generate_requests,
                success_rate,
                average_processing_time,
                uptime,
                requests_per_minute: if minutes > 0.0 {
                    c.total_requests as f64 / minutes
                } else {
                    0.0
                },
            }
        })
    }
}

async fn stats(State(state): State<ApiState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

async fn reset(State(state): State<ApiState>) -> Json<serde_json::Value> {
    state.stats.reset();
    tracing::info!("statistics reset");
    Json(serde_json::json!({ "message": "statistics reset" }))
}
