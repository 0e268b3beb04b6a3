// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image feature extractor
//!
//! Maps a preprocessed image tensor to a fixed-length embedding. The greedy
//! decoder only sees the `FeatureExtractor` trait; `OnnxFeatureExtractor` is
//! the production implementation backed by ONNX Runtime.

use anyhow::{Context, Result};
use ndarray::{Array1, Array4};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Fixed-length image embedding produced once per request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEmbedding(Array1<f32>);

impl ImageEmbedding {
    pub fn new(values: Array1<f32>) -> Self {
        Self(values)
    }

    pub fn from_vec(values: Vec<f32>) -> Self {
        Self(Array1::from_vec(values))
    }

    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    /// Embedding dimension
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps an image tensor (leading batch dimension of 1) to an embedding
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, pixels: &Array4<f32>) -> Result<ImageEmbedding>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(&Array4<f32>) -> Result<ImageEmbedding> + Send + Sync,
{
    fn extract(&self, pixels: &Array4<f32>) -> Result<ImageEmbedding> {
        self(pixels)
    }
}

/// CNN feature extractor exported to ONNX
///
/// Runs on CPU. The session is shared behind a mutex because
/// `Session::run` needs exclusive access.
#[derive(Clone)]
pub struct OnnxFeatureExtractor {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for OnnxFeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxFeatureExtractor")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl OnnxFeatureExtractor {
    /// Load the feature extractor from an ONNX file
    ///
    /// # Errors
    /// Returns error if the file is missing or ONNX Runtime rejects it
    pub async fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!(
                "Feature extractor model not found: {}",
                model_path.display()
            );
        }

        info!("Loading feature extractor from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!(
                    "Failed to load feature extractor from {}",
                    model_path.display()
                )
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input_1".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "output_1".to_string());

        debug!(
            "Feature extractor loaded - input: {}, output: {}",
            input_name, output_name
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
        })
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn extract(&self, pixels: &Array4<f32>) -> Result<ImageEmbedding> {
        if pixels.shape()[0] != 1 {
            anyhow::bail!(
                "Feature extractor expects a batch of 1, got shape {:?}",
                pixels.shape()
            );
        }

        let input_value =
            Value::from_array(pixels.to_owned()).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Feature extractor session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Feature extractor inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract embedding tensor")?;

        debug!("Feature extractor output shape: {:?}", output_tensor.shape());

        // Everything after the batch dimension is the embedding
        let values: Vec<f32> = output_tensor.iter().copied().collect();
        if values.is_empty() {
            anyhow::bail!("Feature extractor produced an empty embedding");
        }

        Ok(ImageEmbedding::from_vec(values))
    }
}
