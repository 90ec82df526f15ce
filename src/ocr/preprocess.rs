//! Raster preprocessing for recognition passes.
//!
//! Backfill bands and low-quality pages benefit from contrast
//! normalization, Otsu binarization, and stroke dilation before the engine
//! sees the pixels.

use image::imageops::FilterType;
use image::GrayImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

/// Binarization applied before a recognition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarization {
    /// Leave grayscale untouched.
    None,
    /// Otsu global threshold with a bias added to the computed level.
    Otsu {
        /// Signed offset applied to the Otsu level.
        bias: i16,
    },
    /// Otsu followed by a 3×3 ink dilation to reconnect broken strokes.
    OtsuDilated {
        /// Signed offset applied to the Otsu level.
        bias: i16,
    },
}

/// Upscale an image by `factor` using Lanczos resampling.
pub fn upscale(image: &GrayImage, factor: f32) -> GrayImage {
    if factor <= 1.0 {
        return image.clone();
    }
    let w = ((image.width() as f32 * factor).round() as u32).max(1);
    let h = ((image.height() as f32 * factor).round() as u32).max(1);
    image::imageops::resize(image, w, h, FilterType::Lanczos3)
}

/// Stretch the luma range to the full 0–255 band.
///
/// Flat images (single gray level) are returned unchanged.
pub fn normalize_contrast(image: &GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for p in image.pixels() {
        min = min.min(p.0[0]);
        max = max.max(p.0[0]);
    }
    if max <= min {
        return image.clone();
    }
    let range = (max - min) as f32;
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = (((p.0[0] - min) as f32 / range) * 255.0).round() as u8;
    }
    out
}

/// Binarize with a biased Otsu threshold.
pub fn binarize_otsu(image: &GrayImage, bias: i16) -> GrayImage {
    let level = otsu_level(image) as i16;
    let biased = (level + bias).clamp(1, 254) as u8;
    threshold(image, biased, ThresholdType::Binary)
}

/// Thicken dark strokes by one pixel in every direction (3×3).
///
/// Ink is dark on a light background, so stroke dilation is an erosion of
/// the bright background.
pub fn dilate_ink(image: &GrayImage) -> GrayImage {
    erode(image, Norm::LInf, 1)
}

/// Run the configured preprocessing chain over a band image.
pub fn preprocess(image: &GrayImage, binarization: Binarization) -> GrayImage {
    match binarization {
        Binarization::None => image.clone(),
        Binarization::Otsu { bias } => binarize_otsu(&normalize_contrast(image), bias),
        Binarization::OtsuDilated { bias } => {
            dilate_ink(&binarize_otsu(&normalize_contrast(image), bias))
        }
    }
}
