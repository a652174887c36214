//! Router tests against a real demo model trained on synthetic images.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use ocrkit_core::CORE_VERSION;
use ocrkit_core::pipeline::{InferenceOrchestrator, TrainOrchestrator};
use ocrkit_core::synth::{self, SynthOptions};
use ocrkit_core::imaging;
use ocrkit_services::{ApiState, build_router};
use ocrkit_types::PipelineContext;

const BOUNDARY: &str = "ocrkit-test-boundary";

fn app(dir: &Path) -> Router {
    let data = dir.join("data");
    synth::write_dataset(&data, 6, &SynthOptions::default()).unwrap();
    let model = dir.join("demo.json");
    let ctx = PipelineContext::builder()
        .dataset_root(&data)
        .artifact_path(&model)
        .epochs(1)
        .preprocess_handler("demo_preprocess")
        .train_handler("demo_train")
        .infer_handler("demo_ocr")
        .build()
        .unwrap();

    let registry = Arc::new(ocrkit_handlers::default_registry().unwrap());
    TrainOrchestrator::new(Arc::clone(&registry)).run(&ctx).unwrap();
    let pipeline = InferenceOrchestrator::from_registry(&registry, &ctx).unwrap();
    build_router(ApiState::new(Arc::new(pipeline), registry, model), &[])
}

fn abcd_png() -> Vec<u8> {
    let img = synth::render("abcd", &SynthOptions::default()).unwrap();
    imaging::encode_png(&image::DynamicImage::ImageRgb8(img)).unwrap()
}

fn multipart(filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/v1/ocr")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(value: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/ocr")
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_version_and_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["version"], CORE_VERSION);
    assert!(body["uptime"].is_number());
    assert_eq!(body["handler_versions"]["demo_ocr"], "1.0.0");
}

#[tokio::test]
async fn json_base64_abcd_captcha() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(
        &app,
        post_json(json!({ "image": STANDARD.encode(abcd_png()), "format": "png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    assert_eq!(body["method"], "json");
    assert_eq!(body["core_version"], CORE_VERSION);
    assert_eq!(body["text"].as_str().unwrap().len(), 4);

    let confidences = body["confidences"].as_array().unwrap();
    assert_eq!(confidences.len(), 4);
    for c in confidences {
        let c = c.as_f64().unwrap();
        assert!((0.0..=1.0).contains(&c));
    }
    assert_eq!(body["image_size"]["original"], json!({"width": 160, "height": 60}));
    assert_eq!(body["details"]["character_count"], 4);
    assert_eq!(body["details"]["handler_info"]["ocr_handler"], "demo_ocr");
    assert_eq!(body["details"]["metadata_completeness"], "full");
}

#[tokio::test]
async fn json_alias_with_data_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(abcd_png()));

    let (status, body) = send(&app, post_json(json!({ "image_base64": data_url }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
}

#[tokio::test]
async fn multipart_upload() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, multipart("abcd.png", "image/png", &abcd_png())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "multipart");
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn truncated_png_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let png = abcd_png();

    let (status, body) = send(&app, multipart("cut.png", "image/png", &png[..png.len() / 3])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert_eq!(body["error_code"], "IMAGE_DECODE_ERROR");
    assert!(body["processing_time"].is_number());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn text_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, multipart("test.txt", "text/plain", b"not an image")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, multipart("empty.png", "image/png", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ocr")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert_eq!(body["error_code"], "MISSING_IMAGE");
    assert!(body["message"].as_str().unwrap().contains("image"));

    let (status, body) = send(&app, post_json(json!({ "image": "%%%" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_BASE64");
}

#[tokio::test]
async fn unknown_route_is_structured_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, get("/nonexistent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");
    assert!(body["detail"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn handlers_info_lists_registry() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, get("/api/v1/handlers/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pipeline_ready"], true);
    assert_eq!(
        body["handlers_info"]["config"]["preprocess_handler"],
        "demo_preprocess"
    );
    let handlers = body["handlers_info"]["handlers"].as_array().unwrap();
    assert!(handlers.iter().any(|h| h["id"] == "linear_ocr"));
}

#[tokio::test]
async fn stats_count_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    send(&app, multipart("abcd.png", "image/png", &abcd_png())).await;
    send(&app, multipart("bad.png", "image/png", b"junk")).await;
    let png = app.clone().oneshot(get("/api/v1/generate?text=abcd")).await.unwrap();
    assert_eq!(png.status(), StatusCode::OK);

    let (status, body) = send(&app, get("/api/v1/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ocr_requests"], 2);
    assert_eq!(body["generate_requests"], 1);
    assert_eq!(body["success_rate"], 0.5);
    // The stats request itself is counted.
    assert_eq!(body["total_requests"], 4);
    for field in ["average_processing_time", "uptime", "requests_per_minute"] {
        assert!(body[field].is_number(), "{field}");
    }

    let reset = Request::builder()
        .method("POST")
        .uri("/api/v1/stats/reset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, reset).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("reset"));

    let (_, body) = send(&app, get("/api/v1/stats")).await;
    assert_eq!(body["ocr_requests"], 0);
    assert_eq!(body["generate_requests"], 0);
}

#[tokio::test]
async fn generate_returns_png_with_label_header() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let response = app.clone().oneshot(get("/api/v1/generate?text=WXYZ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["x-captcha-text"], "wxyz");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let decoded = imaging::decode(&bytes, Some("png")).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (160, 60));

    let (status, body) = send(&app, get("/api/v1/generate?text=ab1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn concurrent_requests_share_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let png = abcd_png();

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let app = app.clone();
            let png = png.clone();
            tokio::spawn(async move { send(&app, multipart("a.png", "image/png", &png)).await })
        })
        .collect();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], true);
    }
}

#[tokio::test]
async fn ocr_get_is_a_usage_hint() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = send(&app, get("/api/v1/ocr")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ocr_handler"], "demo_ocr");
}
