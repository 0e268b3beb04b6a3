// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption model pipeline
//!
//! Combines the feature extractor, caption decoder and vocabulary:
//! image → preprocessing → embedding → greedy decoding → caption.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::decoder::{CaptionDecoder, OnnxCaptionDecoder, SequenceInputType};
use super::encoder::{FeatureExtractor, OnnxFeatureExtractor};
use super::greedy::{generate_caption, Caption, GreedyConfig};
use super::preprocessing::{preprocess_image, PreprocessOptions};
use super::vocabulary::Vocabulary;

const DECODER_FILES: &[&str] = &["model.onnx", "decoder.onnx"];
const EXTRACTOR_FILES: &[&str] = &["feature_extractor.onnx", "encoder.onnx"];
const VOCABULARY_FILES: &[&str] = &["tokenizer.json", "vocab.json"];

/// Decoding and preprocessing settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionOptions {
    pub greedy: GreedyConfig,
    pub preprocess: PreprocessOptions,
}

/// Where and how to load a caption model
#[derive(Debug, Clone)]
pub struct CaptionModelConfig {
    /// Directory holding the decoder, feature extractor and tokenizer
    pub model_dir: PathBuf,
    pub options: CaptionOptions,
    pub sequence_input_type: SequenceInputType,
}

impl Default for CaptionModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./model"),
            options: CaptionOptions::default(),
            sequence_input_type: SequenceInputType::default(),
        }
    }
}

/// Result of captioning one image
#[derive(Debug, Clone)]
pub struct CaptionResult {
    pub caption: Caption,
    /// Original image width
    pub width: u32,
    /// Original image height
    pub height: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Image caption model (feature extractor + greedy decoder)
///
/// Cheap to clone: every component is shared through `Arc`.
#[derive(Clone)]
pub struct CaptionModel {
    extractor: Arc<dyn FeatureExtractor>,
    decoder: Arc<dyn CaptionDecoder>,
    vocabulary: Arc<Vocabulary>,
    options: CaptionOptions,
    name: String,
}

impl std::fmt::Debug for CaptionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionModel")
            .field("name", &self.name)
            .field("vocabulary_size", &self.vocabulary.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CaptionModel {
    /// Load the caption model from a directory
    ///
    /// Expected files:
    /// - model.onnx or decoder.onnx (caption decoder)
    /// - feature_extractor.onnx or encoder.onnx (CNN feature extractor)
    /// - tokenizer.json or vocab.json (vocabulary)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model directory doesn't exist
    /// - Required model files are missing
    /// - ONNX Runtime initialization fails
    pub async fn new(config: CaptionModelConfig) -> Result<Self> {
        let model_dir = config.model_dir.as_path();

        if !model_dir.exists() {
            anyhow::bail!(
                "Caption model directory not found: {}",
                model_dir.display()
            );
        }

        info!("Loading caption model from {}", model_dir.display());

        let decoder_path = Self::find_model_file(model_dir, DECODER_FILES)?;
        let extractor_path = Self::find_model_file(model_dir, EXTRACTOR_FILES)?;
        let vocabulary_path = Self::find_model_file(model_dir, VOCABULARY_FILES)?;

        let vocabulary = Vocabulary::from_file(&vocabulary_path)
            .context("Failed to load caption vocabulary")?;
        info!("Vocabulary loaded: {} words", vocabulary.len());

        let extractor = OnnxFeatureExtractor::new(&extractor_path)
            .await
            .context("Failed to load feature extractor")?;

        let decoder = OnnxCaptionDecoder::new(&decoder_path, config.sequence_input_type)
            .await
            .context("Failed to load caption decoder")?;

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "caption-model".to_string());

        info!("✅ Caption pipeline ready: {} (CPU-only)", name);

        Ok(Self::from_parts(
            Arc::new(extractor),
            Arc::new(decoder),
            vocabulary,
            config.options,
        )
        .with_name(name))
    }

    /// Assemble a model from already-loaded components
    pub fn from_parts(
        extractor: Arc<dyn FeatureExtractor>,
        decoder: Arc<dyn CaptionDecoder>,
        vocabulary: Vocabulary,
        options: CaptionOptions,
    ) -> Self {
        Self {
            extractor,
            decoder,
            vocabulary: Arc::new(vocabulary),
            options,
            name: "caption-model".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Find a model file by trying multiple possible names
    fn find_model_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Model file not found in {}. Tried: {:?}",
                    dir.display(),
                    names
                )
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CaptionOptions {
        &self.options
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Caption a decoded image
    pub fn caption_image(&self, image: &DynamicImage) -> Result<CaptionResult> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        debug!("Preprocessing image {}x{}", width, height);
        let pixels = preprocess_image(image, &self.options.preprocess);

        let embedding = self
            .extractor
            .extract(&pixels)
            .context("Failed to extract image features")?;
        debug!("Image embedding: {} dimensions", embedding.len());

        let caption = generate_caption(
            self.decoder.as_ref(),
            &self.vocabulary,
            &embedding,
            &self.options.greedy,
        )
        .context("Failed to generate caption")?;

        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Caption complete: '{}' ({} steps, {}, {}ms)",
            caption.text,
            caption.steps,
            caption.stop_reason.as_str(),
            processing_time_ms
        );

        Ok(CaptionResult {
            caption,
            width,
            height,
            processing_time_ms,
        })
    }

    /// Load an image from disk and caption it
    pub fn caption_file<P: AsRef<Path>>(&self, path: P) -> Result<CaptionResult> {
        let path = path.as_ref();
        let image = image::ImageReader::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .with_guessed_format()
            .context("Failed to read image header")?
            .decode()
            .with_context(|| format!("Failed to decode image {}", path.display()))?;
        self.caption_image(&image)
    }
}
