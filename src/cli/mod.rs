// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caption;
pub mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Image Caption Node CLI
#[derive(Parser, Debug)]
#[command(name = "image-caption-node")]
#[command(version)]
#[command(about = "Generate image captions with a CNN encoder and greedy decoder", long_about = None)]
pub struct Cli {
    /// Defaults to `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server with the upload page
    Serve(serve::ServeArgs),

    /// Caption a single image file and print the result
    Caption(caption::CaptionArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve(args)) => serve::run(args).await,
        Some(Commands::Caption(args)) => caption::run(args).await,
        None => serve::run(serve::ServeArgs::default()).await,
    }
}
