// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Upload page, health and version endpoint tests

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use image_caption_node::{
    api::{create_router, AppState},
    vision::VisionModelManager,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_upload_page() {
    let (status, page) = get(create_router(AppState::new_for_test()), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Image Caption Generator"));
    assert!(page.contains("Upload an image and generate a caption using a trained model"));
    assert!(page.contains("action=\"/caption\""));
    assert!(page.contains("accept=\".jpg,.jpeg,.png\""));
}

#[tokio::test]
async fn test_health_without_model() {
    let (status, body) = get(create_router(AppState::new_for_test()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["modelLoaded"], false);
    assert_eq!(json["version"], image_caption_node::version::VERSION_NUMBER);
}

#[tokio::test]
async fn test_health_lists_caption_model() {
    let state = AppState::new_for_test();
    *state.vision_model_manager.write().await = Some(Arc::new(VisionModelManager::default()));

    let (_, body) = get(create_router(state), "/health").await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["models"][0]["modelType"], "caption");
    assert_eq!(json["models"][0]["available"], false);
}

#[tokio::test]
async fn test_version_endpoint() {
    let (status, body) = get(create_router(AppState::new_for_test()), "/version").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["version"], image_caption_node::version::VERSION_NUMBER);
    assert_eq!(json["build"], image_caption_node::version::VERSION);
    assert!(json["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "greedy-decoding"));
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = get(create_router(AppState::new_for_test()), "/v1/describe-image").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
