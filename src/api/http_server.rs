// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP server: shared state, routes and serve loop

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::caption::{caption_handler, caption_page_handler, upload_page_handler};
use super::caption::request::MAX_BASE64_LEN;
use crate::vision::{UploadStore, VisionModelManager};

/// Request body limit: a full-size base64 image plus form/JSON overhead
pub const MAX_BODY_SIZE: usize = MAX_BASE64_LEN + 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub vision_model_manager: Arc<RwLock<Option<Arc<VisionModelManager>>>>,
    pub upload_store: Arc<UploadStore>,
}

impl AppState {
    pub fn new(manager: VisionModelManager, upload_store: UploadStore) -> Self {
        Self {
            vision_model_manager: Arc::new(RwLock::new(Some(Arc::new(manager)))),
            upload_store: Arc::new(upload_store),
        }
    }

    /// State with no vision service and uploads in the system temp dir
    pub fn new_for_test() -> Self {
        Self {
            vision_model_manager: Arc::new(RwLock::new(None)),
            upload_store: Arc::new(UploadStore::default()),
        }
    }

    pub async fn model_loaded(&self) -> bool {
        self.vision_model_manager
            .read()
            .await
            .as_ref()
            .map(|m| m.has_caption_model())
            .unwrap_or(false)
    }

    pub async fn model_name(&self) -> String {
        self.vision_model_manager
            .read()
            .await
            .as_ref()
            .and_then(|m| m.get_caption_model())
            .map(|model| model.name().to_string())
            .unwrap_or_else(|| "caption-model".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub name: String,
    pub model_type: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" when the caption model is loaded, "degraded" otherwise
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub models: Vec<ModelStatus>,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let models: Vec<ModelStatus> = match state.vision_model_manager.read().await.as_ref() {
        Some(manager) => manager
            .list_models()
            .into_iter()
            .map(|m| ModelStatus {
                name: m.name,
                model_type: m.model_type,
                available: m.available,
            })
            .collect(),
        None => Vec::new(),
    };
    let model_loaded = state.model_loaded().await;

    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "degraded" }.to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        model_loaded,
        models,
    })
}

/// GET /version
pub async fn version_handler() -> Json<serde_json::Value> {
    Json(crate::version::get_version_info())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(upload_page_handler))
        .route("/caption", post(caption_page_handler))
        .route("/v1/caption", post(caption_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, draining connections");
}
