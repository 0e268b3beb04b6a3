// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Temporary storage for uploaded images
//!
//! Every upload gets its own uniquely named file inside the upload directory.
//! The file is removed when the returned handle is dropped, so concurrent
//! requests never overwrite each other.

use image::{DynamicImage, ImageFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::image_utils::{detect_format, format_to_extension, ImageError, MAX_IMAGE_SIZE};

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write upload bytes to a fresh temporary file
    ///
    /// The format is detected from magic bytes and used as the file extension.
    pub fn persist(&self, bytes: &[u8]) -> Result<(NamedTempFile, ImageFormat), ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::EmptyData);
        }
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
        }

        let format = detect_format(bytes)?;
        let suffix = format!(".{}", format_to_extension(format));

        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!("Stored upload ({} bytes) at {}", bytes.len(), file.path().display());
        Ok((file, format))
    }
}

/// Decode an image file, guessing the format from its content
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ImageError> {
    image::ImageReader::open(path.as_ref())?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}
