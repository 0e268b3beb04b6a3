// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::api::http_server::{start_server, AppState};
use crate::config::NodeConfig;
use crate::vision::{UploadStore, VisionModelConfig, VisionModelManager};

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Directory with model.onnx, feature_extractor.onnx and tokenizer.json
    #[arg(long, env = "CAPTION_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Directory for temporary upload files
    #[arg(long, env = "UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn apply(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(dir) = self.model_dir {
            config.caption.model_dir = dir;
        }
        if let Some(dir) = self.upload_dir {
            config.upload_dir = dir;
        }
        config
    }
}

pub async fn run(args: ServeArgs) -> Result<()> {
    info!("{}", crate::version::get_version_string());

    let config = args.apply(NodeConfig::from_env());
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;

    info!(
        "Caption settings: max_length={}, image_size={}, resize={:?}, layout={:?}",
        config.caption.options.greedy.max_length,
        config.caption.options.preprocess.image_size,
        config.caption.options.preprocess.resize_mode,
        config.caption.options.preprocess.layout
    );

    let manager = VisionModelManager::new(VisionModelConfig {
        caption: Some(config.caption.clone()),
    })
    .await?;

    if !manager.has_caption_model() {
        warn!(
            "Serving without a caption model; POST /caption will return 503 until {} is populated",
            config.caption.model_dir.display()
        );
    }

    let state = AppState::new(manager, UploadStore::new(config.upload_dir.clone()));
    start_server(addr, state).await
}
