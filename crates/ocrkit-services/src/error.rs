//! Error type for the HTTP service.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use ocrkit_core::{CORE_VERSION, PipelineError};

/// Result alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the inference endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Neither a JSON `image` field nor a multipart `file` was sent.
    #[error("no image provided: send JSON {{\"image\": <base64>}} or a multipart 'file' field")]
    MissingImage,

    #[error("image is not valid base64: {0}")]
    InvalidBase64(String),

    /// The body could not be read as JSON or multipart.
    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured failure body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: bool,
    pub error_code: &'static str,
    pub message: String,
    pub core_version: &'static str,
    pub timestamp: String,
    pub processing_time: f64,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingImage => "MISSING_IMAGE",
            Self::InvalidBase64(_) => "INVALID_BASE64",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Pipeline(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::InvalidBase64(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Pipeline(PipelineError::Preprocess(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self, elapsed: Duration) -> ErrorBody {
        ErrorBody {
            status: false,
            error_code: self.code(),
            message: self.to_string(),
            core_version: CORE_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            processing_time: elapsed.as_secs_f64(),
        }
    }

    /// Build the response, reporting how long the request ran.
    pub fn into_response_after(self, elapsed: Duration) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(self.body(elapsed))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_after(Duration::ZERO)
    }
}
