//! Synthetic landmark sets, frames and quality analyzers for tests.
//!
//! Landmarks are laid out in a 512x512 frame so that every pixel position
//! `k / 512` is exact in binary and truncation never moves a point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};

use crate::geometry::Point;
use crate::landmarks::{
    LandmarkSet, CHIN, FACE_MESH_POINTS, LEFT_EYE_EAR, NOSE_TIP, RIGHT_EYE_EAR,
};
use crate::quality::{QualityAnalyzer, QualityMetrics};

pub const FRAME_SIZE: u32 = 512;

/// Width of each synthetic eye in pixels.
const EYE_WIDTH: f64 = 40.0;

/// Normalized point for a pixel position in the 512x512 frame.
pub fn px(x: f64, y: f64) -> Point {
    Point::new(x / f64::from(FRAME_SIZE), y / f64::from(FRAME_SIZE))
}

/// A face that passes every landmark gate: 200x200 px bounding box, head
/// pose near 5 degrees on every axis, EAR 0.3 on both eyes.
pub fn live_face() -> LandmarkSet {
    live_face_with_ear(0.3)
}

/// Same as [`live_face`] with both eyes opened to `ear`. Eyelid offsets are
/// rounded to whole pixels, so the realised EAR is `round(ear * 20) / 20`.
pub fn live_face_with_ear(ear: f64) -> LandmarkSet {
    let mut points = vec![px(278.0, 250.0); FACE_MESH_POINTS];

    // face outline: x 178..378, y 150..350
    points[10] = px(278.0, 150.0);
    points[152] = px(278.0, 350.0);
    points[234] = px(178.0, 250.0);
    points[454] = px(378.0, 250.0);

    // nose to chin 84 px against an expected 76.8 px
    points[NOSE_TIP] = px(278.0, 250.0);
    points[CHIN] = px(278.0, 334.0);

    place_eye(&mut points, &LEFT_EYE_EAR, 228.0, 200.0, ear);
    place_eye(&mut points, &RIGHT_EYE_EAR, 328.0, 209.0, ear);

    LandmarkSet::new(points)
}

fn place_eye(points: &mut [Point], indices: &[usize; 6], outer_x: f64, y: f64, ear: f64) {
    let half_gap = (ear * EYE_WIDTH / 2.0).round();
    let [outer, top_outer, top_inner, inner, bottom_inner, bottom_outer] = *indices;
    points[outer] = px(outer_x, y);
    points[top_outer] = px(outer_x + 10.0, y - half_gap);
    points[top_inner] = px(outer_x + 30.0, y - half_gap);
    points[inner] = px(outer_x + EYE_WIDTH, y);
    points[bottom_inner] = px(outer_x + 30.0, y + half_gap);
    points[bottom_outer] = px(outer_x + 10.0, y + half_gap);
}

/// A face whose bounding box is only 50 px wide.
pub fn small_face() -> LandmarkSet {
    let mut points = vec![px(256.0, 256.0); FACE_MESH_POINTS];
    points[234] = px(231.0, 256.0);
    points[454] = px(281.0, 256.0);
    points[10] = px(256.0, 200.0);
    points[152] = px(256.0, 312.0);
    LandmarkSet::new(points)
}

/// Metrics comfortably inside the default quality thresholds.
pub fn good_metrics() -> QualityMetrics {
    QualityMetrics {
        blur_score: 50.0,
        brightness: 120.0,
        contrast: 40.0,
    }
}

/// 4 px checkerboard of two mid tones: mean 125, contrast 65, plenty of
/// edge energy. Passes the default quality gate with the real analyzer.
pub fn textured_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / 4) + (y / 4)) % 2 == 0 {
            Rgb([60, 60, 60])
        } else {
            Rgb([190, 190, 190])
        }
    })
}

/// Horizontal gradient frame, useful when encodings need to differ.
pub fn gradient_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / width.max(1)) as u8;
        Rgb([v, v, v])
    })
}

/// Returns fixed metrics regardless of the frame.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuality(pub QualityMetrics);

impl QualityAnalyzer for FixedQuality {
    fn assess(&self, _image: &RgbImage) -> QualityMetrics {
        self.0
    }
}

/// Counts calls before delegating to fixed metrics.
#[derive(Debug, Clone)]
pub struct CountingQuality {
    metrics: QualityMetrics,
    calls: Arc<AtomicUsize>,
}

impl CountingQuality {
    pub fn new(metrics: QualityMetrics) -> Self {
        Self {
            metrics,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter; stays valid after the analyzer moves into an engine.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl QualityAnalyzer for CountingQuality {
    fn assess(&self, _image: &RgbImage) -> QualityMetrics {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metrics
    }
}
