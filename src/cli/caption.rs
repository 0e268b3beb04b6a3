// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::api::caption::CaptionResponse;
use crate::config::NodeConfig;
use crate::vision::CaptionModel;

/// Arguments for the caption command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file to caption
    pub image: PathBuf,

    /// Model directory
    #[arg(long, env = "CAPTION_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Maximum sequence length including the start marker
    #[arg(long, env = "CAPTION_MAX_LENGTH")]
    pub max_length: Option<usize>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl CaptionArgs {
    fn apply(&self, mut config: NodeConfig) -> NodeConfig {
        if let Some(ref dir) = self.model_dir {
            config.caption.model_dir = dir.clone();
        }
        if let Some(max_length) = self.max_length {
            config.caption.options.greedy.max_length = max_length;
        }
        config
    }
}

pub async fn run(args: CaptionArgs) -> Result<()> {
    let config = args.apply(NodeConfig::from_env());
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    if !args.image.exists() {
        anyhow::bail!("Image not found: {}", args.image.display());
    }

    let model = CaptionModel::new(config.caption)
        .await
        .context("Failed to load caption model")?;

    let image = args.image.clone();
    let worker = model.clone();
    let result = tokio::task::spawn_blocking(move || worker.caption_file(&image))
        .await
        .context("Caption task failed")??;

    if args.json {
        let response = CaptionResponse::new(result, model.name());
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", result.caption.text);
    }

    Ok(())
}
