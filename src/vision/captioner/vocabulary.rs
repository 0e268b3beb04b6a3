// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption vocabulary (word <-> id mapping)
//!
//! The vocabulary is the tokenizer the caption decoder was trained with. It is
//! loaded once and never mutated. Three on-disk formats are accepted:
//! - Keras tokenizer JSON (`Tokenizer.to_json()`)
//! - a plain `{ "word": id }` JSON object
//! - a HuggingFace `tokenizer.json` with a word-level vocabulary

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Characters Keras strips from text before splitting
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Word separator used by Keras tokenizers
pub const DEFAULT_SPLIT: &str = " ";

/// Text normalization rules applied by `texts_to_sequence`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerOptions {
    /// Lowercase text before lookup
    pub lower: bool,
    /// Characters replaced by the split string
    pub filters: String,
    /// Word separator
    pub split: String,
    /// Only ids below this bound are emitted
    pub num_words: Option<usize>,
    /// Word that unknown words map to
    pub oov_token: Option<String>,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            lower: true,
            filters: DEFAULT_FILTERS.to_string(),
            split: DEFAULT_SPLIT.to_string(),
            num_words: None,
            oov_token: None,
        }
    }
}

/// Bidirectional word/id mapping used by the greedy decoder
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word_index: BTreeMap<String, u32>,
    index_word: HashMap<u32, String>,
    options: TokenizerOptions,
}

fn default_true() -> bool {
    true
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_split() -> String {
    DEFAULT_SPLIT.to_string()
}

/// Keras stores nested dictionaries as JSON-encoded strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordIndexField {
    Encoded(String),
    Map(BTreeMap<String, u32>),
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_true")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    oov_token: Option<String>,
    #[serde(default)]
    char_level: bool,
    word_index: WordIndexField,
}

/// On-disk vocabulary layouts, told apart by the shape of the JSON values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VocabularyFormat {
    Keras,
    HuggingFace,
    WordIndex,
}

impl VocabularyFormat {
    fn detect(value: &serde_json::Value) -> Self {
        let is_keras = value
            .get("config")
            .and_then(serde_json::Value::as_object)
            .is_some_and(|config| config.contains_key("word_index"));
        if is_keras {
            return Self::Keras;
        }

        if value.get("model").is_some_and(serde_json::Value::is_object) {
            return Self::HuggingFace;
        }

        Self::WordIndex
    }
}

#[derive(Debug, Deserialize)]
struct KerasTokenizerJson {
    #[allow(dead_code)]
    #[serde(default)]
    class_name: Option<String>,
    config: KerasTokenizerConfig,
}

impl Vocabulary {
    /// Build a vocabulary from word -> id pairs with Keras default options
    pub fn from_word_index<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self::with_options(pairs, TokenizerOptions::default())
    }

    /// Build a vocabulary from word -> id pairs
    pub fn with_options<I, S>(pairs: I, options: TokenizerOptions) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let word_index: BTreeMap<String, u32> =
            pairs.into_iter().map(|(w, id)| (w.into(), id)).collect();

        // Iteration is ordered by word, so duplicate ids always resolve the same way
        let mut index_word = HashMap::with_capacity(word_index.len());
        for (word, &id) in &word_index {
            index_word.entry(id).or_insert_with(|| word.clone());
        }

        Self {
            word_index,
            index_word,
            options,
        }
    }

    /// Build from an id -> word listing, e.g. `{0: "startseq", 1: "endseq"}`
    pub fn from_index_word<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self::from_word_index(
            pairs
                .into_iter()
                .map(|(id, w)| -> (String, u32) { (w.into(), id) }),
        )
    }

    /// Load a vocabulary file, detecting its format from the JSON structure
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Vocabulary file not found: {}", path.display());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary from {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Vocabulary {} is not valid JSON", path.display()))?;

        let vocabulary = match VocabularyFormat::detect(&value) {
            VocabularyFormat::Keras => {
                debug!("Parsing {} as Keras tokenizer JSON", path.display());
                Self::from_keras_json(&raw)?
            }
            VocabularyFormat::HuggingFace => {
                debug!("Parsing {} as HuggingFace tokenizer", path.display());
                Self::from_hf_tokenizer(path)?
            }
            VocabularyFormat::WordIndex => {
                debug!("Parsing {} as plain word index", path.display());
                let word_index: BTreeMap<String, u32> = serde_json::from_value(value)
                    .context("Plain vocabulary must map words to non-negative integer ids")?;
                Self::from_word_index(word_index)
            }
        };

        info!(
            "Loaded vocabulary with {} words from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    /// Parse the output of Keras `Tokenizer.to_json()`
    pub fn from_keras_json(raw: &str) -> Result<Self> {
        let parsed: KerasTokenizerJson =
            serde_json::from_str(raw).context("Invalid Keras tokenizer JSON")?;
        let config = parsed.config;
        if config.char_level {
            anyhow::bail!("Character-level Keras tokenizers are not supported");
        }

        let word_index = match config.word_index {
            WordIndexField::Map(map) => map,
            WordIndexField::Encoded(encoded) => serde_json::from_str(&encoded)
                .context("Keras word_index is not a JSON object of word ids")?,
        };

        let options = TokenizerOptions {
            lower: config.lower,
            filters: config.filters,
            split: config.split,
            // Keras treats num_words=0 as "no limit"
            num_words: config.num_words.filter(|&n| n > 0),
            oov_token: config.oov_token,
        };

        Ok(Self::with_options(word_index, options))
    }

    /// Load the vocabulary of a HuggingFace tokenizer file
    pub fn from_hf_tokenizer<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        Ok(Self::from_word_index(tokenizer.get_vocab(true)))
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.word_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_index.is_empty()
    }

    /// Size of the id space (largest id + 1)
    pub fn id_space(&self) -> usize {
        self.index_word
            .keys()
            .max()
            .map(|&id| id as usize + 1)
            .unwrap_or(0)
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    /// Look up the word for an id
    pub fn word_for_id(&self, id: u32) -> Option<&str> {
        self.index_word.get(&id).map(String::as_str)
    }

    /// Look up the id for a word (exact match, no normalization)
    pub fn id_for_word(&self, word: &str) -> Option<u32> {
        self.word_index.get(word).copied()
    }

    /// Convert text to ids the way Keras `texts_to_sequences` does
    pub fn texts_to_sequence(&self, text: &str) -> Vec<u32> {
        let text = if self.options.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut normalized = String::with_capacity(text.len());
        for ch in text.chars() {
            if self.options.filters.contains(ch) {
                normalized.push_str(&self.options.split);
            } else {
                normalized.push(ch);
            }
        }

        let oov_id = self
            .options
            .oov_token
            .as_deref()
            .and_then(|token| self.id_for_word(token));

        let split = if self.options.split.is_empty() {
            DEFAULT_SPLIT
        } else {
            self.options.split.as_str()
        };

        normalized
            .split(split)
            .filter(|word| !word.is_empty())
            .filter_map(|word| match self.word_index.get(word) {
                Some(&id) => match self.options.num_words {
                    Some(limit) if id as usize >= limit => oov_id,
                    _ => Some(id),
                },
                None => oov_id,
            })
            .collect()
    }
}
