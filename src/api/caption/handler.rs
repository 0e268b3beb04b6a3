// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption endpoint handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::request::CaptionRequest;
use super::response::CaptionResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::{AppState, MAX_BODY_SIZE};
use crate::api::pages;
use crate::vision::captioner::preprocessing::resize_for_encoder;
use crate::vision::image_utils::encode_png_data_uri;
use crate::vision::{decode_base64_image, load_image, CaptionModel};

/// Multipart field holding the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// GET / - Upload page
pub async fn upload_page_handler() -> Html<String> {
    Html(pages::upload_page())
}

/// POST /v1/caption - Caption a base64-encoded image
///
/// # Response
/// - `caption`: Caption text
/// - `words`, `steps`, `stopReason`: Decoding details
/// - `width`, `height`: Original image dimensions
/// - `processingTimeMs`: Feature extraction plus decoding time
/// - `model`: Model name
///
/// # Errors
/// - 400 Bad Request: Missing or undecodable image
/// - 413 Payload Too Large: Image over 10MB
/// - 415 Unsupported Media Type: Not an image format we can detect
/// - 503 Service Unavailable: Caption model not loaded
/// - 500 Internal Server Error: Inference failed
pub async fn caption_handler(
    State(state): State<AppState>,
    Json(request): Json<CaptionRequest>,
) -> Result<Json<CaptionResponse>, ApiError> {
    if let Err(e) = request.validate() {
        warn!("Caption validation failed: {}", e);
        return Err(e);
    }

    let model = caption_model(&state).await?;
    let image_data = request.image.unwrap_or_default();

    let result = run_blocking(move || {
        let (image, info) = decode_base64_image(&image_data)?;
        debug!(
            "Decoded image: {}x{}, {} bytes",
            info.width, info.height, info.size_bytes
        );
        model.caption_image(&image).map_err(inference_error)
    })
    .await?;

    let model_name = state.model_name().await;
    Ok(Json(CaptionResponse::new(result, &model_name)))
}

/// POST /caption - Caption a browser upload and render the result page
///
/// The upload is written to a temporary file in the upload directory and
/// removed once decoded. The page shows the image at the encoder's input size.
pub async fn caption_page_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    match caption_upload(&state, multipart).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Html(pages::error_page(&e.to_string()))).into_response()
        }
    }
}

async fn caption_upload(state: &AppState, multipart: Multipart) -> Result<String, ApiError> {
    let bytes = read_image_field(multipart).await?;
    let model = caption_model(state).await?;

    let (file, _format) = state.upload_store.persist(&bytes)?;
    info!("Upload stored at {} ({} bytes)", file.path().display(), bytes.len());

    let (result, preview) = run_blocking(move || {
        let image = load_image(file.path())?;
        drop(file);
        let result = model.caption_image(&image).map_err(inference_error)?;
        let preview = preview_data_uri(&model, &image)?;
        Ok((result, preview))
    })
    .await?;

    Ok(pages::result_page(&preview, &result.caption.text))
}

/// The upload as the model saw it: resized to the encoder's square input
fn preview_data_uri(model: &CaptionModel, image: &DynamicImage) -> Result<String, ApiError> {
    let preprocess = &model.options().preprocess;
    let resized = resize_for_encoder(image, preprocess.image_size, preprocess.resize_mode);
    Ok(encode_png_data_uri(&resized)?)
}

async fn read_image_field(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed upload", e))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| multipart_error("Failed to read upload", e));
        }
    }

    Err(ApiError::ValidationError {
        field: IMAGE_FIELD.to_string(),
        message: "image is required".to_string(),
    })
}

/// Body limit hits surface as multipart read errors; report them as 413
fn multipart_error(context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload exceeds body limit of {} bytes", MAX_BODY_SIZE);
        return ApiError::PayloadTooLarge {
            size: MAX_BODY_SIZE + 1,
            max: MAX_BODY_SIZE,
        };
    }
    ApiError::InvalidRequest(format!("{}: {}", context, e))
}

async fn caption_model(state: &AppState) -> Result<Arc<CaptionModel>, ApiError> {
    let manager_guard = state.vision_model_manager.read().await;
    let manager = manager_guard.as_ref().ok_or_else(|| {
        warn!("Vision service not available");
        ApiError::ServiceUnavailable("Vision service not available".to_string())
    })?;

    manager.get_caption_model().ok_or_else(|| {
        warn!("Caption model not loaded");
        ApiError::ServiceUnavailable("Caption model not loaded".to_string())
    })
}

/// Run decoding and inference off the async runtime
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::InternalError(format!("Caption task failed: {}", e)))?
}

fn inference_error(e: anyhow::Error) -> ApiError {
    warn!("Caption inference failed: {:#}", e);
    ApiError::InternalError(format!("Caption generation failed: {:#}", e))
}
