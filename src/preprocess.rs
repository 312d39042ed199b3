//! Image preparation ahead of local OCR.
//!
//! Board photos arrive at any size and under any lighting. Before they reach
//! tesseract they are brought into a workable size range, reduced to grey and
//! binarised with a threshold chosen per image by Otsu's method.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

use crate::config::PreprocessConfig;

/// A binarised image and the threshold that produced it.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub image: GrayImage,
    pub threshold: u8,
    /// Dimensions after resizing, if a resize happened.
    pub resized_to: Option<(u32, u32)>,
}

/// Resize, greyscale and binarise images for OCR.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline. Deterministic for identical input.
    pub fn preprocess(&self, image: &DynamicImage) -> Preprocessed {
        let (width, height) = (image.width(), image.height());
        let resized_to = self.target_dimensions(width, height);

        let gray = match resized_to {
            Some((w, h)) => {
                let filter = if w < width {
                    FilterType::Lanczos3
                } else {
                    FilterType::CatmullRom
                };
                debug!("resizing {}x{} to {}x{}", width, height, w, h);
                image.resize_exact(w, h, filter).to_luma8()
            }
            None => image.to_luma8(),
        };

        let threshold = otsu_threshold(&histogram(&gray));
        debug!("otsu threshold {}", threshold);

        Preprocessed {
            image: binarize(&gray, threshold),
            threshold,
            resized_to,
        }
    }

    /// New dimensions for an image, or `None` if it is already in range.
    ///
    /// Images with either side above the maximum are scaled down to fit,
    /// keeping aspect ratio. Images with both sides below the minimum are
    /// scaled up by the configured integer factor, never past the maximum.
    pub fn target_dimensions(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let max = self.config.max_dimension;
        let min = self.config.min_dimension;

        if width > max || height > max {
            return Some(fit_within(width, height, max));
        }

        if width < min && height < min && self.config.upscale_factor > 1 {
            let factor = self.config.upscale_factor;
            let (w, h) = (width.saturating_mul(factor), height.saturating_mul(factor));
            if w > max || h > max {
                return Some(fit_within(width, height, max));
            }
            return Some((w, h));
        }

        None
    }
}

/// Scale `width` x `height` so the longer side is exactly `max`.
fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = f64::min(
        f64::from(max) / f64::from(width),
        f64::from(max) / f64::from(height),
    );
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max);
    (w, h)
}

/// 256-bin intensity histogram.
pub fn histogram(image: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for Luma([value]) in image.pixels() {
        hist[*value as usize] += 1;
    }
    hist
}

/// Threshold maximising between-class variance (Otsu's method).
///
/// Ties keep the lowest threshold. A histogram with a single populated bin
/// yields 0.
pub fn otsu_threshold(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    let sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_b = 0.0;
    let mut w_b: u64 = 0;
    let mut max_variance = 0.0;
    let mut threshold = 0u8;

    for (t, &count) in hist.iter().enumerate() {
        w_b += count;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }

        sum_b += t as f64 * count as f64;
        let m_b = sum_b / w_b as f64;
        let m_f = (sum - sum_b) / w_f as f64;
        let variance = w_b as f64 * w_f as f64 * (m_b - m_f).powi(2);

        if variance > max_variance {
            max_variance = variance;
            threshold = t as u8;
        }
    }

    threshold
}

/// Pixels above the threshold become white, the rest black.
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for Luma([value]) in out.pixels_mut() {
        *value = if *value > threshold { 255 } else { 0 };
    }
    out
}
