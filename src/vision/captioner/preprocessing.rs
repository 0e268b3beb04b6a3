// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the caption feature extractor

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;
use std::str::FromStr;

/// Default square input size of the feature extractor
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Fill color for letterbox padding and empty images
const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// How a non-square image is fitted to the square input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Resize to exact size (may distort aspect ratio)
    #[default]
    Stretch,
    /// Resize keeping aspect ratio with center crop
    CenterCrop,
    /// Resize keeping aspect ratio with padding (letterbox)
    Letterbox,
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stretch" => Ok(Self::Stretch),
            "center_crop" | "centercrop" | "crop" => Ok(Self::CenterCrop),
            "letterbox" | "pad" => Ok(Self::Letterbox),
            other => Err(format!(
                "unknown resize mode '{}', expected stretch, center_crop or letterbox",
                other
            )),
        }
    }
}

/// Memory layout of the image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, Keras channels-last
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!(
                "unknown tensor layout '{}', expected nhwc or nchw",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub image_size: u32,
    pub resize_mode: ResizeMode,
    pub layout: TensorLayout,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_INPUT_SIZE,
            resize_mode: ResizeMode::default(),
            layout: TensorLayout::default(),
        }
    }
}

/// Preprocess an image for the feature extractor
///
/// Steps:
/// 1. Resize to `image_size` x `image_size` using the configured mode
/// 2. Convert to RGB
/// 3. Scale channels to `[0, 1]`
/// 4. Lay out as NHWC or NCHW with a batch dimension of 1
pub fn preprocess_image(image: &DynamicImage, options: &PreprocessOptions) -> Array4<f32> {
    let resized = resize_for_encoder(image, options.image_size, options.resize_mode);
    let rgb = resized.to_rgb8();

    let size = options.image_size as usize;
    let mut tensor = match options.layout {
        TensorLayout::Nhwc => Array4::zeros((1, size, size, 3)),
        TensorLayout::Nchw => Array4::zeros((1, 3, size, size)),
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match options.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}

/// Resize image to a square of `target_size` using the given mode
pub fn resize_for_encoder(image: &DynamicImage, target_size: u32, mode: ResizeMode) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return DynamicImage::ImageRgb8(RgbImage::from_pixel(target_size, target_size, GRAY));
    }

    match mode {
        // Nearest neighbour, as Keras `load_img(target_size=...)` does
        ResizeMode::Stretch => image.resize_exact(target_size, target_size, FilterType::Nearest),
        ResizeMode::CenterCrop => center_crop_resize(image, target_size),
        ResizeMode::Letterbox => letterbox_resize(image, target_size),
    }
}

fn center_crop_resize(image: &DynamicImage, target_size: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    let scale = (target_size as f32 / orig_w as f32).max(target_size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).max(target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).max(target_size);

    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);

    let crop_x = (new_w - target_size) / 2;
    let crop_y = (new_h - target_size) / 2;
    resized.crop_imm(crop_x, crop_y, target_size, target_size)
}

fn letterbox_resize(image: &DynamicImage, target_size: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let mut output = RgbImage::from_pixel(target_size, target_size, GRAY);
    let offset_x = (target_size - new_w) / 2;
    let offset_y = (target_size - new_h) / 2;
    image::imageops::overlay(&mut output, &resized, offset_x as i64, offset_y as i64);

    DynamicImage::ImageRgb8(output)
}
