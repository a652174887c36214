//! `/api/v1/generate`: render a synthetic CAPTCHA as PNG.
//!
//! `?text=abcd` renders that label; without it a random label is drawn
//! from `seed`. The label is echoed in the `x-captcha-text` header.

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

use ocrkit_core::imaging;
use ocrkit_core::synth::{self, SynthOptions};
use ocrkit_types::is_valid_label;

use super::ApiState;
use crate::error::{ApiError, ApiResult};

pub const TEXT_HEADER: &str = "x-captcha-text";

pub fn generate_routes() -> Router<ApiState> {
    Router::new().route("/generate", get(generate))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub seed: u64,
}

/// Render the requested CAPTCHA, returning its label and PNG bytes.
pub fn render_png(query: &GenerateQuery) -> ApiResult<(String, Vec<u8>)> {
    let text = match &query.text {
        Some(t) => {
            let t = t.trim().to_ascii_lowercase();
            if !is_valid_label(&t) {
                return Err(ApiError::InvalidRequest(format!(
                    "text must be exactly 4 letters a-z, got '{t}'"
                )));
            }
            t
        }
        None => synth::random_label(&mut StdRng::seed_from_u64(query.seed)),
    };
    let opts = SynthOptions {
        seed: query.seed,
        ..SynthOptions::default()
    };
    let image = synth::render(&text, &opts).map_err(|e| ApiError::Internal(e.to_string()))?;
    let png = imaging::encode_png(&image::DynamicImage::ImageRgb8(image))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((text, png))
}

async fn generate(State(state): State<ApiState>, Query(query): Query<GenerateQuery>) -> Response {
    state.stats.record_generate();
    match render_png(&query) {
        Ok((text, png)) => {
            tracing::debug!(%text, "rendered captcha");
            (
                [(CONTENT_TYPE.as_str(), "image/png".to_string()), (TEXT_HEADER, text)],
                png,
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}
