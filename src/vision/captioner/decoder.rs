// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption decoder
//!
//! Maps an image embedding and a fixed-width, left-padded id sequence to a
//! probability distribution over the vocabulary. The greedy loop drives it one
//! step at a time.

use anyhow::{Context, Result};
use ndarray::{Array2, Ix1, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::encoder::ImageEmbedding;

/// Next-token distribution for a partial caption
#[cfg_attr(test, mockall::automock)]
pub trait CaptionDecoder: Send + Sync {
    fn predict(&self, embedding: &ImageEmbedding, sequence: &[i64]) -> Result<Vec<f32>>;
}

impl<F> CaptionDecoder for F
where
    F: Fn(&ImageEmbedding, &[i64]) -> Result<Vec<f32>> + Send + Sync,
{
    fn predict(&self, embedding: &ImageEmbedding, sequence: &[i64]) -> Result<Vec<f32>> {
        self(embedding, sequence)
    }
}

/// Element type of the decoder's sequence input
///
/// Keras `Input(shape=(max_length,))` exports as float32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceInputType {
    #[default]
    Float32,
    Int64,
}

impl FromStr for SequenceInputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "float32" | "f32" | "float" => Ok(Self::Float32),
            "int64" | "i64" | "long" => Ok(Self::Int64),
            other => Err(format!(
                "unknown sequence input type '{}', expected float32 or int64",
                other
            )),
        }
    }
}

/// Recurrent caption decoder exported to ONNX
#[derive(Clone)]
pub struct OnnxCaptionDecoder {
    session: Arc<Mutex<Session>>,
    embedding_input: String,
    sequence_input: String,
    sequence_type: SequenceInputType,
}

impl std::fmt::Debug for OnnxCaptionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxCaptionDecoder")
            .field("embedding_input", &self.embedding_input)
            .field("sequence_input", &self.sequence_input)
            .field("sequence_type", &self.sequence_type)
            .finish_non_exhaustive()
    }
}

impl OnnxCaptionDecoder {
    /// Load the caption decoder from an ONNX file
    ///
    /// The model must take two inputs, in order: the image embedding and the
    /// padded id sequence.
    pub async fn new<P: AsRef<Path>>(model_path: P, sequence_type: SequenceInputType) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Caption decoder model not found: {}", model_path.display());
        }

        info!("Loading caption decoder from {}", model_path.display());

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
                    "Failed to load caption decoder from {}",
                    model_path.display()
                )
            })?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        debug!("Decoder inputs: {:?}", input_names);

        let [embedding_input, sequence_input] = match input_names.as_slice() {
            [embedding, sequence] => [embedding.clone(), sequence.clone()],
            other => anyhow::bail!(
                "Caption decoder must have exactly 2 inputs (embedding, sequence), found {:?}",
                other
            ),
        };

        info!(
            "Caption decoder loaded (CPU-only, sequence input {:?})",
            sequence_type
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            embedding_input,
            sequence_input,
            sequence_type,
        })
    }
}

impl CaptionDecoder for OnnxCaptionDecoder {
    fn predict(&self, embedding: &ImageEmbedding, sequence: &[i64]) -> Result<Vec<f32>> {
        let embedding_array = embedding
            .as_array()
            .to_owned()
            .into_shape_with_order((1, embedding.len()))
            .context("Failed to reshape embedding")?;
        let embedding_value = Value::from_array(embedding_array)
            .context("Failed to create embedding tensor")?
            .into_dyn();

        let width = sequence.len();
        let sequence_value = match self.sequence_type {
            SequenceInputType::Float32 => {
                let ids: Vec<f32> = sequence.iter().map(|&id| id as f32).collect();
                let array = Array2::from_shape_vec((1, width), ids)
                    .context("Failed to shape sequence input")?;
                Value::from_array(array)
                    .context("Failed to create sequence tensor")?
                    .into_dyn()
            }
            SequenceInputType::Int64 => {
                let array = Array2::from_shape_vec((1, width), sequence.to_vec())
                    .context("Failed to shape sequence input")?;
                Value::from_array(array)
                    .context("Failed to create sequence tensor")?
                    .into_dyn()
            }
        };

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Caption decoder session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                self.embedding_input.as_str() => embedding_value,
                self.sequence_input.as_str() => sequence_value
            ])
            .context("Caption decoder inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract decoder output")?;

        match output_tensor.ndim() {
            1 => {
                let row = output_tensor
                    .into_dimensionality::<Ix1>()
                    .context("Unexpected decoder output shape")?;
                Ok(row.to_vec())
            }
            2 => {
                let rows = output_tensor
                    .into_dimensionality::<Ix2>()
                    .context("Unexpected decoder output shape")?;
                Ok(rows.row(0).to_vec())
            }
            _ => anyhow::bail!(
                "Unexpected decoder output shape: {:?}",
                output_tensor.shape()
            ),
        }
    }
}
