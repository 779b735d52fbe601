//! Head pose from 2D landmark positions.
//!
//! Cheap proxies for yaw, pitch and roll, good enough for a binary
//! "facing the camera" gate without solving a 3D pose:
//!
//! - yaw: horizontal offset of the eye-corner midpoint from the frame centre,
//!   against half the frame width
//! - pitch: nose-to-chin distance against an expected 15% of frame height
//! - roll: slope of the line between the two eye corners
//!
//! All angles are reported as magnitudes in degrees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{atan2_degrees, euclidean_distance, line_angle_degrees};
use crate::landmarks::{LandmarkSet, CHIN, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER};

/// Expected nose-tip to chin distance as a fraction of frame height.
const EXPECTED_NOSE_CHIN_RATIO: f64 = 0.15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("landmark {index} missing from a set of {len} points")]
    MissingLandmark { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl PoseAngles {
    /// True when no angle exceeds `max_degrees`.
    pub fn within(&self, max_degrees: f64) -> bool {
        self.yaw <= max_degrees && self.pitch <= max_degrees && self.roll <= max_degrees
    }
}

/// Estimate head pose for a `frame_width` x `frame_height` frame.
pub fn estimate_pose(
    landmarks: &LandmarkSet,
    frame_height: u32,
    frame_width: u32,
) -> Result<PoseAngles, PoseError> {
    let pixel = |index: usize| {
        landmarks
            .pixel(index, frame_width, frame_height)
            .ok_or(PoseError::MissingLandmark {
                index,
                len: landmarks.len(),
            })
    };

    let nose_tip = pixel(NOSE_TIP)?;
    let chin = pixel(CHIN)?;
    let left_eye = pixel(LEFT_EYE_OUTER)?;
    let right_eye = pixel(RIGHT_EYE_OUTER)?;

    let half_width = f64::from(frame_width) / 2.0;
    let eye_center_x = (left_eye.x + right_eye.x) / 2.0;
    let yaw = atan2_degrees(eye_center_x - half_width, half_width);

    let expected = f64::from(frame_height) * EXPECTED_NOSE_CHIN_RATIO;
    let nose_chin = euclidean_distance(nose_tip, chin);
    let pitch = atan2_degrees(nose_chin - expected, expected);

    let roll = line_angle_degrees(left_eye, right_eye);

    Ok(PoseAngles {
        yaw: yaw.abs(),
        pitch: pitch.abs(),
        roll: roll.abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::landmarks::FACE_MESH_POINTS;

    const FRAME: u32 = 512;

    /// Face-mesh sized set with the four pose keypoints at pixel positions
    /// in a 512x512 frame (k/512 is exact in binary).
    fn pose_set(left: (f64, f64), right: (f64, f64), nose: (f64, f64), chin: (f64, f64)) -> LandmarkSet {
        let n = |(x, y): (f64, f64)| Point::new(x / 512.0, y / 512.0);
        let mut points = vec![n((256.0, 256.0)); FACE_MESH_POINTS];
        points[LEFT_EYE_OUTER] = n(left);
        points[RIGHT_EYE_OUTER] = n(right);
        points[NOSE_TIP] = n(nose);
        points[CHIN] = n(chin);
        LandmarkSet::new(points)
    }

    #[test]
    fn test_frontal_face_is_near_zero() {
        // eye midpoint on centre, level eyes, nose-chin = 0.15 * 512 rounded
        let lm = pose_set((206.0, 220.0), (306.0, 220.0), (256.0, 260.0), (256.0, 337.0));
        let pose = estimate_pose(&lm, FRAME, FRAME).unwrap();
        assert!(pose.yaw.abs() < 1e-9);
        assert!(pose.roll.abs() < 1e-9);
        assert!(pose.pitch < 1.0, "pitch {}", pose.pitch);
        assert!(pose.within(30.0));
    }

    #[test]
    fn test_yaw_from_offset() {
        // midpoint 256 px right of centre -> atan(256 / 256) = 45 degrees
        let lm = pose_set((462.0, 220.0), (562.0, 220.0), (512.0, 260.0), (512.0, 337.0));
        let pose = estimate_pose(&lm, FRAME, FRAME).unwrap();
        assert!((pose.yaw - 45.0).abs() < 1e-9);
        assert!(!pose.within(30.0));
    }

    #[test]
    fn test_within_includes_limit() {
        let at_limit = PoseAngles {
            yaw: 30.0,
            pitch: 30.0,
            roll: 30.0,
        };
        assert!(at_limit.within(30.0));
        let over = PoseAngles {
            roll: 30.000001,
            ..at_limit
        };
        assert!(!over.within(30.0));
    }

    #[test]
    fn test_yaw_is_magnitude() {
        let left_turn = pose_set((106.0, 220.0), (206.0, 220.0), (156.0, 260.0), (156.0, 337.0));
        let right_turn = pose_set((306.0, 220.0), (406.0, 220.0), (356.0, 260.0), (356.0, 337.0));
        let a = estimate_pose(&left_turn, FRAME, FRAME).unwrap();
        let b = estimate_pose(&right_turn, FRAME, FRAME).unwrap();
        assert!(a.yaw > 0.0);
        assert!((a.yaw - b.yaw).abs() < 1e-9);
    }

    #[test]
    fn test_roll_from_tilted_eyes() {
        let lm = pose_set((206.0, 200.0), (306.0, 300.0), (256.0, 260.0), (256.0, 337.0));
        let pose = estimate_pose(&lm, FRAME, FRAME).unwrap();
        assert!((pose.roll - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_from_short_nose_chin() {
        // nose-chin collapses to zero -> atan2(-expected, expected) = -45
        let lm = pose_set((206.0, 220.0), (306.0, 220.0), (256.0, 300.0), (256.0, 300.0));
        let pose = estimate_pose(&lm, FRAME, FRAME).unwrap();
        assert!((pose.pitch - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_landmark_is_error() {
        let lm = LandmarkSet::new(vec![Point::new(0.5, 0.5); 100]);
        let err = estimate_pose(&lm, FRAME, FRAME).unwrap_err();
        assert_eq!(
            err,
            PoseError::MissingLandmark {
                index: RIGHT_EYE_OUTER,
                len: 100
            }
        );
    }
}
