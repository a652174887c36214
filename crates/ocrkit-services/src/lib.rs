//! HTTP inference service for ocrkit.
//!
//! Wraps a loaded [`InferenceOrchestrator`](ocrkit_core::pipeline::InferenceOrchestrator)
//! in an axum router:
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/api/v1/ocr` | GET | readiness and usage hint |
//! | `/api/v1/ocr` | POST | recognize one image (JSON base64 or multipart `file`) |
//! | `/api/v1/generate` | GET | render a synthetic CAPTCHA PNG (`?text=`, `?seed=`) |
//! | `/api/v1/health` | GET | status, core version, uptime, handler versions |
//! | `/api/v1/handlers/info` | GET | active handler ids and every registered handler |
//! | `/api/v1/stats` | GET | request counters |
//! | `/api/v1/stats/reset` | POST | zero the counters |
//!
//! Unknown routes return a structured `404` with `error_code: "NOT_FOUND"`.

pub mod api;
pub mod error;

pub use api::{ApiState, build_router};
pub use error::{ApiError, ApiResult};
