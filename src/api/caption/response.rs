// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption response types

use serde::{Deserialize, Serialize};

use crate::vision::CaptionResult;

/// Response from the caption endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionResponse {
    /// Caption text without start/end markers
    pub caption: String,
    /// Generated words in order
    pub words: Vec<String>,
    /// Decoder invocations
    pub steps: usize,
    /// end_marker, unknown_id or max_length
    pub stop_reason: String,
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u64,
    /// Model used for captioning
    pub model: String,
}

impl CaptionResponse {
    pub fn new(result: CaptionResult, model: &str) -> Self {
        Self {
            stop_reason: result.caption.stop_reason.as_str().to_string(),
            caption: result.caption.text,
            words: result.caption.words,
            steps: result.caption.steps,
            width: result.width,
            height: result.height,
            processing_time_ms: result.processing_time_ms,
            model: model.to_string(),
        }
    }
}
