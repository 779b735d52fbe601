//! Eye aspect ratio (EAR).
//!
//! For six eye points ordered `[outer, top-outer, top-inner, inner,
//! bottom-inner, bottom-outer]`:
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```
//!
//! An open eye sits around 0.25 to 0.35; a blink drops towards zero.

use serde::{Deserialize, Serialize};

use crate::geometry::{euclidean_distance, Point};

/// Number of points an EAR computation needs per eye.
pub const EYE_POINTS: usize = 6;

/// EAR for one eye. Returns 0.0 when fewer than six points are given or the
/// eye has zero width; callers treat 0.0 as "not computable".
pub fn compute_ear(points: &[Point]) -> f64 {
    if points.len() < EYE_POINTS {
        return 0.0;
    }

    let outer_vertical = euclidean_distance(points[1], points[5]);
    let inner_vertical = euclidean_distance(points[2], points[4]);
    let horizontal = euclidean_distance(points[0], points[3]);

    if horizontal == 0.0 {
        return 0.0;
    }

    (outer_vertical + inner_vertical) / (2.0 * horizontal)
}

/// Per-eye EAR values recorded on a liveness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EarValues {
    pub left: f64,
    pub right: f64,
    pub average: f64,
}

impl EarValues {
    pub fn from_eyes(left_eye: &[Point], right_eye: &[Point]) -> Self {
        let left = compute_ear(left_eye);
        let right = compute_ear(right_eye);
        Self {
            left,
            right,
            average: (left + right) / 2.0,
        }
    }
}
