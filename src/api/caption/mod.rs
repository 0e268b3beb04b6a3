// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption API endpoint module
//!
//! Provides POST /v1/caption (JSON) and POST /caption (browser upload form).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{caption_handler, caption_page_handler, upload_page_handler};
pub use request::CaptionRequest;
pub use response::CaptionResponse;
