// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image captioning with a CNN feature extractor and a greedy sequence decoder
//!
//! Components:
//! - `vocabulary` - Word/id mapping with Keras tokenizer semantics
//! - `encoder` - Feature extractor producing the image embedding
//! - `decoder` - Next-word distribution for a partial caption
//! - `greedy` - Greedy decoding loop
//! - `preprocessing` - Image preprocessing for the feature extractor
//! - `model` - Combined caption pipeline

pub mod decoder;
pub mod encoder;
pub mod greedy;
pub mod model;
pub mod preprocessing;
pub mod vocabulary;

pub use decoder::{CaptionDecoder, OnnxCaptionDecoder, SequenceInputType};
pub use encoder::{FeatureExtractor, ImageEmbedding, OnnxFeatureExtractor};
pub use greedy::{generate_caption, Caption, CaptionError, GreedyConfig, StopReason};
pub use model::{CaptionModel, CaptionModelConfig, CaptionOptions, CaptionResult};
pub use preprocessing::{PreprocessOptions, ResizeMode, TensorLayout};
pub use vocabulary::{TokenizerOptions, Vocabulary};
