//! Face-mesh landmark sets and the fixed index subsets the analyzers read.
//!
//! Landmarks arrive from an external detector in normalized `[0, 1]`
//! coordinates using the 468-point face-mesh topology. Every conversion to
//! pixel space truncates toward zero, so a point at `0.999 * width` lands on
//! the last column rather than one past it.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Number of points in a full face-mesh landmark set.
pub const FACE_MESH_POINTS: usize = 468;

/// Left eye EAR landmarks: outer, top-outer, top-inner, inner, bottom-inner, bottom-outer.
pub const LEFT_EYE_EAR: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Right eye EAR landmarks, same ordering as [`LEFT_EYE_EAR`].
pub const RIGHT_EYE_EAR: [usize; 6] = [362, 385, 387, 263, 373, 380];

pub const NOSE_TIP: usize = 1;
pub const CHIN: usize = 18;
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 362;

/// Landmarks for one detected face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Landmark `index` in pixel coordinates for a `width` x `height` frame.
    pub fn pixel(&self, index: usize, width: u32, height: u32) -> Option<Point> {
        self.get(index).map(|p| to_pixel(p, width, height))
    }

    /// Pixel coordinates for each index present in the set, in index order.
    /// Indices beyond the set are skipped, so callers detect a short
    /// extraction by comparing lengths.
    pub fn extract_pixels(&self, indices: &[usize], width: u32, height: u32) -> Vec<Point> {
        indices
            .iter()
            .filter_map(|&idx| self.pixel(idx, width, height))
            .collect()
    }

    /// Pixel bounding box over every landmark, or `None` for an empty set.
    pub fn bounding_box(&self, width: u32, height: u32) -> Option<FaceBox> {
        let first = self.points.first()?;
        let (w, h) = (f64::from(width), f64::from(height));
        let init = (first.x * w, first.x * w, first.y * h, first.y * h);
        let (x_min, x_max, y_min, y_max) =
            self.points.iter().fold(init, |(x0, x1, y0, y1), p| {
                let (x, y) = (p.x * w, p.y * h);
                (x0.min(x), x1.max(x), y0.min(y), y1.max(y))
            });

        Some(FaceBox {
            left: x_min.trunc() as i64,
            top: y_min.trunc() as i64,
            right: x_max.trunc() as i64,
            bottom: y_max.trunc() as i64,
        })
    }
}

fn to_pixel(p: Point, width: u32, height: u32) -> Point {
    Point::new(
        (p.x * f64::from(width)).trunc(),
        (p.y * f64::from(height)).trunc(),
    )
}

/// Axis-aligned face rectangle in pixel coordinates; `right` and `bottom`
/// are exclusive when used as a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl FaceBox {
    pub const fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// The smaller side, used by the face size gate.
    pub fn min_side(&self) -> i64 {
        self.width().min(self.height())
    }

    /// Intersect with a `width` x `height` image. Returns `(x, y, w, h)`
    /// for a non-empty intersection.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = self.left.clamp(0, i64::from(width));
        let right = self.right.clamp(0, i64::from(width));
        let top = self.top.clamp(0, i64::from(height));
        let bottom = self.bottom.clamp(0, i64::from(height));

        if right <= left || bottom <= top {
            return None;
        }

        // All four values lie in 0..=u32::MAX after clamping.
        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}
