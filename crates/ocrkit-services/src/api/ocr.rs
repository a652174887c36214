//! `/api/v1/ocr`: image recognition.
//!
//! Accepts either a JSON body `{"image": "<base64>", "format": "png"}`
//! (`image_base64` is accepted as an alias, and a `data:` URL prefix is
//! stripped) or a `multipart/form-data` upload with a `file` field. Both
//! are normalized into one [`InferenceRequest`] before reaching the core.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use ocrkit_core::{CORE_VERSION, imaging};
use ocrkit_types::LABEL_LENGTH;
use ocrkit_types::report::{ImageSize, InferenceRequest, InferenceResponse};

use super::ApiState;
use crate::error::{ApiError, ApiResult};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Mean confidence below which a warning is attached.
const LOW_CONFIDENCE: f32 = 0.5;

pub fn ocr_routes() -> Router<ApiState> {
    Router::new().route("/ocr", get(ocr_ready).post(ocr))
}

async fn ocr_ready(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "message": "POST an image as JSON {\"image\": <base64>} or multipart field 'file'",
        "ocr_handler": state.pipeline.infer_id(),
        "core_version": CORE_VERSION,
    }))
}

#[derive(Debug, Deserialize)]
struct JsonImage {
    #[serde(default, alias = "image_base64")]
    image: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

/// How the image arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Json,
    Multipart,
}

#[derive(Debug, Serialize)]
struct HandlerPair<'a> {
    preprocess_handler: &'a str,
    ocr_handler: &'a str,
}

/// Whether the response carries every per-character and per-handler
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataCompleteness {
    Full,
    Partial,
}

impl MetadataCompleteness {
    fn of(response: &InferenceResponse, preprocess_id: &str, infer_id: &str) -> Self {
        let versions = &response.handler_versions;
        if response.confidences.len() == LABEL_LENGTH
            && versions.contains_key(preprocess_id)
            && versions.contains_key(infer_id)
        {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

#[derive(Debug, Serialize)]
struct Details<'a> {
    character_count: usize,
    handler_info: HandlerPair<'a>,
    warnings: Vec<String>,
    metadata_completeness: MetadataCompleteness,
}

#[derive(Debug, Serialize)]
struct OcrSuccess<'a> {
    status: bool,
    text: String,
    confidence: f32,
    confidences: Vec<f32>,
    image_size: ImageSize,
    processing_time: f64,
    timestamp: String,
    method: Method,
    core_version: &'static str,
    handler_versions: BTreeMap<String, String>,
    details: Details<'a>,
}

/// Split a `data:image/png;base64,...` URL into its MIME type and payload.
fn strip_data_url(raw: &str) -> (Option<&str>, &str) {
    match raw.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, payload)) => {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, raw),
    }
}

/// Decode a JSON request body.
pub fn parse_json(body: &[u8]) -> ApiResult<InferenceRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::MissingImage);
    }
    let parsed: JsonImage =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    let raw = parsed
        .image
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::MissingImage)?;

    let (mime, payload) = strip_data_url(raw.trim());
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::InvalidBase64(e.to_string()))?;
    let format = parsed.format.or_else(|| mime.map(str::to_string));

    let request = InferenceRequest::new(bytes);
    Ok(match format {
        Some(f) => request.with_format(f),
        None => request,
    })
}

async fn read_multipart(mut multipart: Multipart) -> ApiResult<InferenceRequest> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // Generic content types like application/octet-stream are ignored
        // so the decoder can sniff the bytes instead.
        let format = field
            .content_type()
            .filter(|ct| imaging::parse_format(ct).is_some())
            .or_else(|| {
                field
                    .file_name()
                    .and_then(|n| n.rsplit_once('.'))
                    .map(|(_, ext)| ext)
                    .filter(|ext| imaging::parse_format(ext).is_some())
            })
            .map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let request = InferenceRequest::new(bytes.to_vec());
        return Ok(match format {
            Some(f) => request.with_format(f),
            None => request,
        });
    }
    Err(ApiError::MissingImage)
}

async fn read_image(state: &ApiState, request: Request) -> ApiResult<(InferenceRequest, Method)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        return Ok((read_multipart(multipart).await?, Method::Multipart));
    }

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    Ok((parse_json(&body)?, Method::Json))
}

async fn recognize(state: &ApiState, request: InferenceRequest) -> ApiResult<InferenceResponse> {
    let pipeline = Arc::clone(&state.pipeline);
    tokio::task::spawn_blocking(move || pipeline.infer(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("inference task failed: {e}")))?
        .map_err(ApiError::from)
}

fn success(state: &ApiState, response: InferenceResponse, method: Method, elapsed: Duration) -> Response {
    let mut warnings = Vec::new();
    if response.confidence < LOW_CONFIDENCE {
        warnings.push(format!(
            "low confidence ({:.2}); the result may be wrong",
            response.confidence
        ));
    }
    let character_count = response.text.chars().count();
    let preprocess_id = state.pipeline.preprocess_id();
    let infer_id = state.pipeline.infer_id();
    let metadata_completeness = MetadataCompleteness::of(&response, preprocess_id, infer_id);
    let body = OcrSuccess {
        status: true,
        text: response.text,
        confidence: response.confidence,
        confidences: response.confidences,
        image_size: response.image_size,
        processing_time: elapsed.as_secs_f64(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        method,
        core_version: CORE_VERSION,
        handler_versions: response.handler_versions,
        details: Details {
            character_count,
            handler_info: HandlerPair {
                preprocess_handler: preprocess_id,
                ocr_handler: infer_id,
            },
            warnings,
            metadata_completeness,
        },
    };
    Json(body).into_response()
}

async fn ocr(State(state): State<ApiState>, request: Request) -> Response {
    let started = Instant::now();
    let outcome = match read_image(&state, request).await {
        Ok((req, method)) => recognize(&state, req).await.map(|r| (r, method)),
        Err(e) => Err(e),
    };
    let elapsed = started.elapsed();
    state.stats.record_ocr(outcome.is_ok(), elapsed);

    match outcome {
        Ok((response, method)) => {
            tracing::debug!(text = %response.text, ?method, "recognized");
            success(&state, response, method, elapsed)
        }
        Err(err) => err.into_response_after(elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        assert_eq!(
            strip_data_url("data:image/png;base64,AAAA"),
            (Some("image/png"), "AAAA")
        );
        assert_eq!(strip_data_url("AAAA"), (None, "AAAA"));
    }

    #[test]
    fn json_alias_and_format() {
        let req = parse_json(br#"{"image_base64": "data:image/jpeg;base64,AQID"}"#).unwrap();
        assert_eq!(req.bytes, vec![1, 2, 3]);
        assert_eq!(req.format.as_deref(), Some("image/jpeg"));

        let req = parse_json(br#"{"image": "AQID", "format": "png"}"#).unwrap();
        assert_eq!(req.format.as_deref(), Some("png"));
    }

    #[test]
    fn json_without_image_is_missing() {
        assert!(matches!(parse_json(b""), Err(ApiError::MissingImage)));
        assert!(matches!(parse_json(b"{}"), Err(ApiError::MissingImage)));
        assert!(matches!(
            parse_json(br#"{"image": "  "}"#),
            Err(ApiError::MissingImage)
        ));
    }

    #[test]
    fn completeness_needs_all_confidences_and_versions() {
        let mut response = InferenceResponse {
            text: "abcd".into(),
            confidence: 0.9,
            confidences: vec![0.9; 4],
            image_size: ImageSize {
                original: ocrkit_types::report::Dimensions::new(160, 60),
                processed: ocrkit_types::report::Dimensions::new(128, 64),
            },
            handler_versions: BTreeMap::from([
                ("pre".to_string(), "1.0.0".to_string()),
                ("ocr".to_string(), "1.0.0".to_string()),
            ]),
        };
        assert_eq!(
            MetadataCompleteness::of(&response, "pre", "ocr"),
            MetadataCompleteness::Full
        );
        response.handler_versions.remove("pre");
        assert_eq!(
            MetadataCompleteness::of(&response, "pre", "ocr"),
            MetadataCompleteness::Partial
        );
    }

    #[test]
    fn bad_base64_and_bad_json() {
        assert!(matches!(
            parse_json(br#"{"image": "***"}"#),
            Err(ApiError::InvalidBase64(_))
        ));
        assert!(matches!(
            parse_json(b"not json"),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
