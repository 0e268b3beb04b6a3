// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Longest base64 string that can decode to `MAX_IMAGE_SIZE` bytes
pub const MAX_BASE64_LEN: usize = MAX_IMAGE_SIZE.div_ceil(3) * 4;

/// Request for an image caption
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionRequest {
    /// Base64-encoded image data (a data URI prefix is accepted)
    #[serde(default)]
    pub image: Option<String>,
}

impl CaptionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let image = match self.image.as_deref() {
            Some(image) if !image.trim().is_empty() => image,
            _ => {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: "image is required".to_string(),
                })
            }
        };

        if image.len() > MAX_BASE64_LEN + 64 {
            return Err(ApiError::ValidationError {
                field: "image".to_string(),
                message: format!("image exceeds maximum size of {} bytes", MAX_IMAGE_SIZE),
            });
        }

        Ok(())
    }
}
