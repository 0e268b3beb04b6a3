// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caption;
pub mod errors;
pub mod http_server;
pub mod pages;

pub use caption::{caption_handler, caption_page_handler, CaptionRequest, CaptionResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, start_server, AppState, HealthResponse};
