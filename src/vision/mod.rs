// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based image captioning
//!
//! This module provides:
//! - Image captioning via a CNN feature extractor and a greedy decoder
//! - Image decoding and temporary upload storage

pub mod captioner;
pub mod image_utils;
pub mod model_manager;
pub mod upload;

pub use captioner::{Caption, CaptionModel, CaptionModelConfig, CaptionResult, StopReason};
pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use model_manager::{VisionModelConfig, VisionModelInfo, VisionModelManager};
pub use upload::{load_image, UploadStore};
