// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Greedy caption decoding
//!
//! Starting from the start marker, repeatedly ask the decoder for the most
//! likely next word and append it. Decoding stops when the end marker or an
//! id without a word is produced, or when the sequence holds `max_length`
//! entries (the start marker included).

use thiserror::Error;
use tracing::{debug, warn};

use super::decoder::CaptionDecoder;
use super::encoder::ImageEmbedding;
use super::vocabulary::Vocabulary;

/// Default caption length bound (start marker included)
pub const DEFAULT_MAX_LENGTH: usize = 34;

/// Default start marker
pub const DEFAULT_START_TOKEN: &str = "startseq";

/// Default end marker
pub const DEFAULT_END_TOKEN: &str = "endseq";

/// Id used to left-pad sequences to the decoder's fixed width
pub const DEFAULT_PAD_ID: i64 = 0;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("max_length must be at least 1")]
    InvalidMaxLength,

    #[error("decoder returned an empty probability distribution")]
    EmptyDistribution,

    #[error("decoder failed: {0}")]
    Decoder(#[source] anyhow::Error),
}

/// Settings for the greedy loop
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyConfig {
    /// Upper bound on sequence length, also the decoder's input width
    pub max_length: usize,
    pub start_token: String,
    pub end_token: String,
    pub pad_id: i64,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            start_token: DEFAULT_START_TOKEN.to_string(),
            end_token: DEFAULT_END_TOKEN.to_string(),
            pad_id: DEFAULT_PAD_ID,
        }
    }
}

/// Why decoding finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The decoder produced the end marker
    EndMarker,
    /// The decoder produced an id with no word
    UnknownId(u32),
    /// The sequence reached `max_length` entries
    MaxLength,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndMarker => "end_marker",
            Self::UnknownId(_) => "unknown_id",
            Self::MaxLength => "max_length",
        }
    }
}

/// A finished caption
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    /// Caption text without markers
    pub text: String,
    /// Words appended after the start marker
    pub words: Vec<String>,
    /// Number of decoder invocations
    pub steps: usize,
    pub stop_reason: StopReason,
}

/// Index of the largest value; ties go to the lowest index, NaN never wins
pub fn argmax(distribution: &[f32]) -> Option<u32> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &p) in distribution.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if p <= current => {}
            _ => best = Some((idx, p)),
        }
    }
    best.map(|(idx, _)| idx as u32)
}

/// Left-pad (or keep the last `width` ids) to exactly `width` entries
pub fn pad_sequence(ids: &[u32], width: usize, pad_id: i64) -> Vec<i64> {
    if ids.len() >= width {
        return ids[ids.len() - width..].iter().map(|&id| id as i64).collect();
    }
    let mut padded = vec![pad_id; width - ids.len()];
    padded.extend(ids.iter().map(|&id| id as i64));
    padded
}

/// Run greedy decoding for one image embedding
pub fn generate_caption<D>(
    decoder: &D,
    vocabulary: &Vocabulary,
    embedding: &ImageEmbedding,
    config: &GreedyConfig,
) -> Result<Caption, CaptionError>
where
    D: CaptionDecoder + ?Sized,
{
    if config.max_length == 0 {
        return Err(CaptionError::InvalidMaxLength);
    }

    let mut sequence = vec![config.start_token.clone()];
    let mut steps = 0;
    let mut size_checked = false;

    let stop_reason = loop {
        if sequence.len() >= config.max_length {
            break StopReason::MaxLength;
        }

        let ids = vocabulary.texts_to_sequence(&sequence.join(" "));
        let padded = pad_sequence(&ids, config.max_length, config.pad_id);

        let distribution = decoder
            .predict(embedding, &padded)
            .map_err(CaptionError::Decoder)?;
        steps += 1;

        if !size_checked {
            size_checked = true;
            if distribution.len() != vocabulary.id_space() {
                warn!(
                    "Decoder distribution has {} entries, vocabulary id space is {}",
                    distribution.len(),
                    vocabulary.id_space()
                );
            }
        }

        let next_id = argmax(&distribution).ok_or(CaptionError::EmptyDistribution)?;

        match vocabulary.word_for_id(next_id) {
            None => {
                debug!("Step {}: id {} has no word, stopping", steps, next_id);
                break StopReason::UnknownId(next_id);
            }
            Some(word) if word == config.end_token => {
                debug!("Step {}: end marker", steps);
                break StopReason::EndMarker;
            }
            Some(word) => {
                debug!("Step {}: id {} = '{}'", steps, next_id, word);
                sequence.push(word.to_string());
            }
        }
    };

    let words: Vec<String> = sequence
        .into_iter()
        .skip(1)
        .filter(|w| *w != config.start_token && *w != config.end_token)
        .collect();
    let text = words.join(" ").trim().to_string();

    Ok(Caption {
        text,
        words,
        steps,
        stop_reason,
    })
}
