//! Capture quality heuristics over the grayscale frame.
//!
//! These are lenient screens for degraded webcam captures, not ground truth:
//! Laplacian variance for blur (a flat re-photographed print scores low),
//! mean intensity for exposure, standard deviation for contrast.

use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Variance of the Laplacian response. Low values mean little
    /// high-frequency detail.
    pub blur_score: f64,
    /// Mean grayscale intensity, 0-255.
    pub brightness: f64,
    /// Standard deviation of grayscale intensity.
    pub contrast: f64,
}

/// Produces quality metrics for a frame.
///
/// The liveness engine calls this at most once per assessment, and only
/// after the face detection and size gates have passed.
pub trait QualityAnalyzer: Send + Sync {
    fn assess(&self, image: &RgbImage) -> QualityMetrics;
}

/// Default analyzer: 4-neighbour Laplacian with reflect-101 borders.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplacianQuality;

impl QualityAnalyzer for LaplacianQuality {
    fn assess(&self, image: &RgbImage) -> QualityMetrics {
        assess_quality(image)
    }
}

pub fn assess_quality(image: &RgbImage) -> QualityMetrics {
    let gray = to_plane(&to_luma(image));
    if gray.is_empty() {
        return QualityMetrics::default();
    }

    let (brightness, variance) = mean_and_variance(gray.iter().copied());
    let laplacian = laplacian(&gray);
    let (_, blur_score) = mean_and_variance(laplacian.iter().copied());

    QualityMetrics {
        blur_score,
        brightness,
        contrast: variance.sqrt(),
    }
}

/// BT.601 luma, rounded to nearest. The brightness band and the encoding
/// histogram are calibrated on these weights.
pub(crate) fn to_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000;
        Luma([luma as u8])
    })
}

fn to_plane(gray: &GrayImage) -> Array2<f64> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    Array2::from_shape_fn((h, w), |(y, x)| f64::from(gray.as_raw()[y * w + x]))
}

/// Kernel `[0 1 0; 1 -4 1; 0 1 0]`.
fn laplacian(plane: &Array2<f64>) -> Array2<f64> {
    let (h, w) = plane.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let up = plane[[reflect_101(y as isize - 1, h), x]];
        let down = plane[[reflect_101(y as isize + 1, h), x]];
        let left = plane[[y, reflect_101(x as isize - 1, w)]];
        let right = plane[[y, reflect_101(x as isize + 1, w)]];
        up + down + left + right - 4.0 * plane[[y, x]]
    })
}

/// Mirror an out-of-range index without repeating the edge pixel
/// (`gfedcb|abcdefgh|gfedcba`). Only handles offsets of one.
fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    if i < 0 {
        (-i) as usize
    } else if i > last {
        (2 * last - i) as usize
    } else {
        i as usize
    }
}

/// Population mean and variance.
fn mean_and_variance(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, var)
}
