// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration loaded from environment variables

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::vision::captioner::greedy::{
    DEFAULT_END_TOKEN, DEFAULT_MAX_LENGTH, DEFAULT_PAD_ID, DEFAULT_START_TOKEN,
};
use crate::vision::captioner::preprocessing::DEFAULT_INPUT_SIZE;
use crate::vision::captioner::{
    CaptionModelConfig, CaptionOptions, GreedyConfig, PreprocessOptions, SequenceInputType,
};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MODEL_DIR: &str = "./model";

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Directory for temporary upload files
    pub upload_dir: PathBuf,
    pub caption: CaptionModelConfig,
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            listen_addr: lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            caption: CaptionModelConfig {
                model_dir: lookup("CAPTION_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.caption.model_dir),
                options: CaptionOptions {
                    greedy: GreedyConfig {
                        max_length: parse_or(&lookup, "CAPTION_MAX_LENGTH", DEFAULT_MAX_LENGTH),
                        start_token: lookup("CAPTION_START_TOKEN")
                            .unwrap_or_else(|| DEFAULT_START_TOKEN.to_string()),
                        end_token: lookup("CAPTION_END_TOKEN")
                            .unwrap_or_else(|| DEFAULT_END_TOKEN.to_string()),
                        pad_id: parse_or(&lookup, "CAPTION_PAD_ID", DEFAULT_PAD_ID),
                    },
                    preprocess: PreprocessOptions {
                        image_size: parse_or(&lookup, "CAPTION_IMAGE_SIZE", DEFAULT_INPUT_SIZE),
                        resize_mode: parse_or(&lookup, "CAPTION_RESIZE_MODE", Default::default()),
                        layout: parse_or(&lookup, "CAPTION_TENSOR_LAYOUT", Default::default()),
                    },
                },
                sequence_input_type: parse_or(
                    &lookup,
                    "CAPTION_SEQUENCE_DTYPE",
                    SequenceInputType::default(),
                ),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if SocketAddr::from_str(&self.listen_addr).is_err() {
            return Err(format!("Invalid listen address: {}", self.listen_addr));
        }

        let greedy = &self.caption.options.greedy;
        if greedy.max_length == 0 {
            return Err("Caption max length must be greater than 0".to_string());
        }
        if greedy.start_token.trim().is_empty() || greedy.end_token.trim().is_empty() {
            return Err("Start and end tokens must not be empty".to_string());
        }
        if greedy.start_token == greedy.end_token {
            return Err("Start and end tokens must differ".to_string());
        }

        if self.caption.options.preprocess.image_size == 0 {
            return Err("Image size must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            upload_dir: env::temp_dir(),
            caption: CaptionModelConfig {
                model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
                ..Default::default()
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}
