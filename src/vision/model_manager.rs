// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager for loading the caption model

use std::sync::Arc;

use crate::vision::captioner::{CaptionModel, CaptionModelConfig};

/// Configuration for loading vision models
#[derive(Debug, Clone, Default)]
pub struct VisionModelConfig {
    /// Caption model settings (optional)
    pub caption: Option<CaptionModelConfig>,
}

/// Information about a loaded vision model
#[derive(Debug, Clone)]
pub struct VisionModelInfo {
    pub name: String,
    /// Model type (caption)
    pub model_type: String,
    pub available: bool,
}

/// Holds the models loaded at startup
///
/// A model that fails to load is logged and left out; the node still serves
/// the upload page and reports the model as unavailable.
#[derive(Debug, Default)]
pub struct VisionModelManager {
    caption_model: Option<Arc<CaptionModel>>,
}

impl VisionModelManager {
    pub async fn new(config: VisionModelConfig) -> anyhow::Result<Self> {
        let caption_model = match config.caption {
            Some(caption_config) => {
                let dir = caption_config.model_dir.display().to_string();
                match CaptionModel::new(caption_config).await {
                    Ok(model) => {
                        tracing::info!("✅ Caption model loaded from {}", dir);
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Failed to load caption model from {}: {:#}", dir, e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Self { caption_model })
    }

    /// Wrap an already-built caption model
    pub fn with_model(model: CaptionModel) -> Self {
        Self {
            caption_model: Some(Arc::new(model)),
        }
    }

    pub fn get_caption_model(&self) -> Option<Arc<CaptionModel>> {
        self.caption_model.clone()
    }

    pub fn has_caption_model(&self) -> bool {
        self.caption_model.is_some()
    }

    pub fn list_models(&self) -> Vec<VisionModelInfo> {
        vec![VisionModelInfo {
            name: self
                .caption_model
                .as_ref()
                .map(|m| m.name().to_string())
                .unwrap_or_else(|| "caption-model".to_string()),
            model_type: "caption".to_string(),
            available: self.caption_model.is_some(),
        }]
    }
}
