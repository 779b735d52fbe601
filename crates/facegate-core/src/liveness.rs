//! Single-frame liveness gate.
//!
//! A frame is accepted only when a face is present, large enough, captured
//! under usable conditions, turned towards the camera, and showing two
//! naturally open eyes. Checks run in a fixed order and stop at the first
//! failure, so the cheap landmark gates run before the full-frame quality
//! pass and a verdict always names the earliest problem.
//!
//! # Threat Coverage
//!
//! - **Blocks:** absent or distant subjects, heavily blurred or flat
//!   re-photographed prints, badly lit captures, averted heads, closed eyes.
//! - **Does not block:** sharp printed photos held square to the camera,
//!   screen replays, masks. This is a capture-quality gate, not anti-spoofing.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ear::{EarValues, EYE_POINTS};
use crate::landmarks::{LandmarkSet, LEFT_EYE_EAR, RIGHT_EYE_EAR};
use crate::pose::{estimate_pose, PoseAngles, PoseError};
use crate::quality::{LaplacianQuality, QualityAnalyzer, QualityMetrics};

/// Message on a passing verdict.
pub const PASS_MESSAGE: &str = "Liveness check passed";

/// Prefix for verdicts produced from an internal fault.
pub const ERROR_PREFIX: &str = "Liveness detection error";

// Confidence contributions, in tenths so sums are exact.
const FACE_POINTS: u8 = 3;
const QUALITY_POINTS: u8 = 2;
const POSE_POINTS: u8 = 2;
const EYES_POINTS: u8 = 1;
const OPENNESS_POINTS: u8 = 2;
const MAX_POINTS: u8 = 10;

/// Thresholds for the liveness gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessPolicy {
    /// Minimum face bounding-box side, in pixels.
    pub min_face_size: u32,
    /// Minimum Laplacian variance.
    pub min_blur_score: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_contrast: f64,
    /// Maximum yaw, pitch or roll, in degrees.
    pub max_head_rotation: f64,
    /// Accepted band for the two-eye average EAR, inclusive.
    pub min_ear: f64,
    pub max_ear: f64,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            min_face_size: 100,
            min_blur_score: 20.0,
            min_brightness: 50.0,
            max_brightness: 200.0,
            min_contrast: 20.0,
            max_head_rotation: 30.0,
            min_ear: 0.2,
            max_ear: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    Blurry,
    PoorLighting,
    LowContrast,
}

/// The check that rejected a frame. Variants are declared in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailingCheck {
    FaceDetected,
    FaceSize,
    ImageQuality(QualityIssue),
    HeadPose,
    EyesDetected,
    EyeOpenness,
    /// The assessment itself failed (detector error, malformed landmarks).
    Internal,
}

impl FailingCheck {
    /// User-facing guidance for this failure.
    pub fn message(&self) -> &'static str {
        match self {
            Self::FaceDetected => "No face detected",
            Self::FaceSize => "Face too small. Please move closer to the camera",
            Self::ImageQuality(QualityIssue::Blurry) => {
                "Image too blurry. Please ensure good lighting and steady camera"
            }
            Self::ImageQuality(QualityIssue::PoorLighting) => {
                "Poor lighting conditions. Please adjust lighting"
            }
            Self::ImageQuality(QualityIssue::LowContrast) => {
                "Low image contrast. Please improve lighting"
            }
            Self::HeadPose => "Please face the camera directly",
            Self::EyesDetected => "Eyes not clearly detected",
            Self::EyeOpenness => "Please keep your eyes naturally open and look at the camera",
            Self::Internal => ERROR_PREFIX,
        }
    }
}

impl fmt::Display for FailingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Per-check outcomes. A check that never ran stays `false`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LivenessChecks {
    pub face_detected: bool,
    pub face_size_ok: bool,
    pub image_quality_ok: bool,
    pub head_pose_ok: bool,
    pub eyes_detected: bool,
    pub ear_values: EarValues,
}

/// Outcome of one liveness assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessVerdict {
    pub is_live: bool,
    /// Sum of the weights of passed checks, in `[0, 1]`. Exactly 1.0 iff live.
    pub confidence: f64,
    /// First failing check; `None` iff live.
    pub failing_check: Option<FailingCheck>,
    pub message: String,
    pub checks: LivenessChecks,
    /// Measured quality, when the quality check ran.
    pub quality: Option<QualityMetrics>,
    /// Estimated pose, when the pose check ran.
    pub pose: Option<PoseAngles>,
}

impl LivenessVerdict {
    /// Verdict for an assessment that could not complete.
    pub fn fault(detail: impl fmt::Display) -> Self {
        Assessment::default().into_fault(detail)
    }
}

#[derive(Error, Debug)]
enum LivenessError {
    #[error(transparent)]
    Pose(#[from] PoseError),
}

/// Accumulates partial results while the checks run.
#[derive(Default)]
struct Assessment {
    checks: LivenessChecks,
    points: u8,
    quality: Option<QualityMetrics>,
    pose: Option<PoseAngles>,
}

impl Assessment {
    fn into_verdict(self, failing_check: Option<FailingCheck>) -> LivenessVerdict {
        let message = failing_check.map_or(PASS_MESSAGE, |c| c.message());
        LivenessVerdict {
            is_live: failing_check.is_none(),
            confidence: f64::from(self.points.min(MAX_POINTS)) / f64::from(MAX_POINTS),
            failing_check,
            message: message.to_string(),
            checks: self.checks,
            quality: self.quality,
            pose: self.pose,
        }
    }

    fn into_fault(self, detail: impl fmt::Display) -> LivenessVerdict {
        LivenessVerdict {
            is_live: false,
            confidence: 0.0,
            failing_check: Some(FailingCheck::Internal),
            message: format!("{ERROR_PREFIX}: {detail}"),
            checks: self.checks,
            quality: self.quality,
            pose: self.pose,
        }
    }
}

/// Runs the liveness checks against a [`LivenessPolicy`].
///
/// The quality analyzer is a seam so callers can substitute a cheaper or
/// instrumented implementation; it runs only once the landmark gates pass.
#[derive(Debug, Clone)]
pub struct LivenessEngine<Q = LaplacianQuality> {
    policy: LivenessPolicy,
    quality: Q,
}

impl LivenessEngine<LaplacianQuality> {
    pub fn new(policy: LivenessPolicy) -> Self {
        Self::with_quality(policy, LaplacianQuality)
    }
}

impl Default for LivenessEngine<LaplacianQuality> {
    fn default() -> Self {
        Self::new(LivenessPolicy::default())
    }
}

impl<Q: QualityAnalyzer> LivenessEngine<Q> {
    pub fn with_quality(policy: LivenessPolicy, quality: Q) -> Self {
        Self { policy, quality }
    }

    pub fn policy(&self) -> &LivenessPolicy {
        &self.policy
    }

    /// Assess `image` given the landmarks of its most prominent face, if any.
    /// Never fails: internal faults become an `Internal` verdict.
    pub fn assess(&self, image: &RgbImage, face: Option<&LandmarkSet>) -> LivenessVerdict {
        let mut assessment = Assessment::default();
        match self.evaluate(image, face, &mut assessment) {
            Ok(failing_check) => {
                let verdict = assessment.into_verdict(failing_check);
                tracing::debug!(
                    is_live = verdict.is_live,
                    confidence = verdict.confidence,
                    failing_check = ?verdict.failing_check,
                    "liveness assessed"
                );
                verdict
            }
            Err(e) => {
                tracing::warn!(error = %e, "liveness assessment failed");
                assessment.into_fault(e)
            }
        }
    }

    /// Returns the first failing check, or `None` when every check passes.
    fn evaluate(
        &self,
        image: &RgbImage,
        face: Option<&LandmarkSet>,
        a: &mut Assessment,
    ) -> Result<Option<FailingCheck>, LivenessError> {
        let p = &self.policy;
        let (width, height) = image.dimensions();

        let Some(face) = face.filter(|f| !f.is_empty()) else {
            return Ok(Some(FailingCheck::FaceDetected));
        };
        a.checks.face_detected = true;

        let face_size = face
            .bounding_box(width, height)
            .map_or(0, |bbox| bbox.min_side());
        if face_size < i64::from(p.min_face_size) {
            tracing::debug!(face_size, min = p.min_face_size, "face too small");
            return Ok(Some(FailingCheck::FaceSize));
        }
        a.checks.face_size_ok = true;
        a.points += FACE_POINTS;

        let q = self.quality.assess(image);
        a.quality = Some(q);
        tracing::debug!(
            blur = q.blur_score,
            brightness = q.brightness,
            contrast = q.contrast,
            "image quality"
        );
        // Negated comparisons so NaN metrics fail.
        if !(q.blur_score >= p.min_blur_score) {
            return Ok(Some(FailingCheck::ImageQuality(QualityIssue::Blurry)));
        }
        if !(q.brightness >= p.min_brightness && q.brightness <= p.max_brightness) {
            return Ok(Some(FailingCheck::ImageQuality(QualityIssue::PoorLighting)));
        }
        if !(q.contrast >= p.min_contrast) {
            return Ok(Some(FailingCheck::ImageQuality(QualityIssue::LowContrast)));
        }
        a.checks.image_quality_ok = true;
        a.points += QUALITY_POINTS;

        let pose = estimate_pose(face, height, width)?;
        a.pose = Some(pose);
        tracing::debug!(yaw = pose.yaw, pitch = pose.pitch, roll = pose.roll, "head pose");
        if !pose.within(p.max_head_rotation) {
            return Ok(Some(FailingCheck::HeadPose));
        }
        a.checks.head_pose_ok = true;
        a.points += POSE_POINTS;

        let left_eye = face.extract_pixels(&LEFT_EYE_EAR, width, height);
        let right_eye = face.extract_pixels(&RIGHT_EYE_EAR, width, height);
        if left_eye.len() < EYE_POINTS || right_eye.len() < EYE_POINTS {
            return Ok(Some(FailingCheck::EyesDetected));
        }
        a.checks.eyes_detected = true;
        a.points += EYES_POINTS;

        let ear = EarValues::from_eyes(&left_eye, &right_eye);
        a.checks.ear_values = ear;
        tracing::debug!(left = ear.left, right = ear.right, average = ear.average, "eye aspect ratio");
        if !(ear.average >= p.min_ear && ear.average <= p.max_ear) {
            return Ok(Some(FailingCheck::EyeOpenness));
        }
        a.points += OPENNESS_POINTS;

        Ok(None)
    }
}
