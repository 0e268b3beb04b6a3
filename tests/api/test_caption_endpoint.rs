// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Caption endpoint tests for POST /v1/caption and POST /caption
//!
//! A caption model is assembled from closures so the full HTTP path runs
//! without ONNX files: the decoder emits "a", "dog", then the end marker.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use image_caption_node::{
    api::{create_router, http_server::MAX_BODY_SIZE, AppState},
    vision::{
        captioner::{CaptionOptions, GreedyConfig, PreprocessOptions},
        CaptionModel, UploadStore, VisionModelManager,
    },
    ImageEmbedding, Vocabulary,
};
use ndarray::Array4;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "caption-test-boundary";

fn test_image(format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(40, 30)
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

fn fake_model() -> CaptionModel {
    let vocabulary =
        Vocabulary::from_index_word([(0, "startseq"), (1, "endseq"), (2, "a"), (3, "dog")]);

    let extractor = |pixels: &Array4<f32>| -> anyhow::Result<ImageEmbedding> {
        Ok(ImageEmbedding::from_vec(vec![pixels.len() as f32; 8]))
    };
    let decoder = |_: &ImageEmbedding, sequence: &[i64]| -> anyhow::Result<Vec<f32>> {
        let next = match sequence.iter().filter(|&&id| id != 0).count() {
            0 => 2,
            1 => 3,
            _ => 1,
        };
        let mut distribution = vec![0.0; 4];
        distribution[next] = 1.0;
        Ok(distribution)
    };

    let options = CaptionOptions {
        greedy: GreedyConfig::default(),
        preprocess: PreprocessOptions {
            image_size: 16,
            ..Default::default()
        },
    };
    CaptionModel::from_parts(Arc::new(extractor), Arc::new(decoder), vocabulary, options)
        .with_name("test-captioner")
}

fn state_with_model(upload_dir: &std::path::Path) -> AppState {
    AppState::new(
        VisionModelManager::with_model(fake_model()),
        UploadStore::new(upload_dir),
    )
}

fn json_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/caption")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/caption")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_json_caption_success() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let image = STANDARD.encode(test_image(ImageFormat::Png));
    let response = app
        .oneshot(json_request(serde_json::json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["caption"], "a dog");
    assert_eq!(json["words"], serde_json::json!(["a", "dog"]));
    assert_eq!(json["steps"], 3);
    assert_eq!(json["stopReason"], "end_marker");
    assert_eq!(json["width"], 40);
    assert_eq!(json["height"], 30);
    assert_eq!(json["model"], "test-captioner");
}

#[tokio::test]
async fn test_json_caption_accepts_data_uri() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let image = format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(test_image(ImageFormat::Jpeg))
    );
    let response = app
        .oneshot(json_request(serde_json::json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["caption"], "a dog");
}

#[tokio::test]
async fn test_json_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app.oneshot(json_request(serde_json::json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_type"], "validation_error");
    assert_eq!(json["details"]["field"], "image");
}

#[tokio::test]
async fn test_json_invalid_base64() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(json_request(serde_json::json!({ "image": "not-valid-base64!!!" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_json_not_an_image() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let image = STANDARD.encode(b"just some text, definitely not pixels");
    let response = app
        .oneshot(json_request(serde_json::json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_json_model_not_loaded() {
    let mut state = AppState::new_for_test();
    state.vision_model_manager = Arc::new(tokio::sync::RwLock::new(Some(Arc::new(
        VisionModelManager::default(),
    ))));
    let app = create_router(state);

    let image = STANDARD.encode(test_image(ImageFormat::Png));
    let response = app
        .oneshot(json_request(serde_json::json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["message"], "Caption model not loaded");
}

#[tokio::test]
async fn test_json_no_vision_service() {
    let app = create_router(AppState::new_for_test());

    let image = STANDARD.encode(test_image(ImageFormat::Png));
    let response = app
        .oneshot(json_request(serde_json::json!({ "image": image })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_upload_renders_result_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(multipart_request(
            "image",
            "dog.png",
            "image/png",
            &test_image(ImageFormat::Png),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let page = body_text(response).await;
    assert!(page.contains("src=\"data:image/png;base64,"));
    assert!(page.contains(&ammonia::clean_text("a dog")));
    assert!(page.contains("class=\"caption\""));
}

#[tokio::test]
async fn test_result_page_shows_image_at_model_input_size() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(multipart_request(
            "image",
            "dog.jpg",
            "image/jpeg",
            &test_image(ImageFormat::Jpeg),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    let prefix = "src=\"data:image/png;base64,";
    let start = page.find(prefix).unwrap() + prefix.len();
    let end = start + page[start..].find('"').unwrap();
    let shown = image::load_from_memory(&STANDARD.decode(&page[start..end]).unwrap()).unwrap();

    // The 40x30 upload is displayed as the model's 16x16 input
    assert_eq!((shown.width(), shown.height()), (16, 16));
}

#[tokio::test]
async fn test_upload_over_body_limit_is_413() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let mut data = test_image(ImageFormat::Png);
    data.resize(MAX_BODY_SIZE + 1024, 0);

    let response = app
        .oneshot(multipart_request("image", "huge.png", "image/png", &data))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let page = body_text(response).await;
    assert!(page.contains("class=\"error\""));
}

#[tokio::test]
async fn test_upload_temp_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(multipart_request(
            "image",
            "dog.jpg",
            "image/jpeg",
            &test_image(ImageFormat::Jpeg),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let leftover = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftover, 0, "upload files should be deleted after the request");
}

#[tokio::test]
async fn test_upload_missing_image_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(multipart_request(
            "photo",
            "dog.png",
            "image/png",
            &test_image(ImageFormat::Png),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = body_text(response).await;
    assert!(page.contains("class=\"error\""));
}

#[tokio::test]
async fn test_upload_unsupported_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(state_with_model(dir.path()));

    let response = app
        .oneshot(multipart_request(
            "image",
            "notes.txt",
            "text/plain",
            b"hello, this is not an image",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_upload_without_model() {
    let app = create_router(AppState::new_for_test());

    let response = app
        .oneshot(multipart_request(
            "image",
            "dog.png",
            "image/png",
            &test_image(ImageFormat::Png),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
