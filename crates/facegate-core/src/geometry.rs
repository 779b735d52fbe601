//! Planar geometry helpers shared by the landmark analyzers.

use serde::{Deserialize, Serialize};

/// A 2D point. Landmark sets carry normalized coordinates; eye points and
/// pose keypoints carry pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        euclidean_distance(*self, *other)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

pub fn euclidean_distance(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Angle of the vector `(x, y)` from the positive x axis, in degrees.
pub fn atan2_degrees(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

/// Angle of the line `from -> to` relative to horizontal, in degrees.
pub fn line_angle_degrees(from: Point, to: Point) -> f64 {
    atan2_degrees(to.y - from.y, to.x - from.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_345_triangle() {
        let d = euclidean_distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Point::new(12.5, -3.0);
        let b = Point::new(-7.0, 9.25);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_horizontal_line_has_zero_angle() {
        let angle = line_angle_degrees(Point::new(10.0, 20.0), Point::new(50.0, 20.0));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_diagonal_line_is_45_degrees() {
        let angle = line_angle_degrees(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert!((angle - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_reversed_line_is_180_degrees() {
        let angle = line_angle_degrees(Point::new(10.0, 0.0), Point::new(0.0, 0.0));
        assert!((angle.abs() - 180.0).abs() < 1e-9);
    }
}
