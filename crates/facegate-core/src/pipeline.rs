//! End-to-end verification: detect once, gate on liveness, then encode and
//! match. This is the surface an attendance service calls into.

use std::panic::{self, AssertUnwindSafe};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::detector::{panic_message, DetectorError, LandmarkDetector};
use crate::encoding::{FaceEncoder, FaceEncoding};
use crate::landmarks::LandmarkSet;
use crate::liveness::{LivenessEngine, LivenessVerdict};
use crate::matcher::{EuclideanMatcher, MatchResult, Matcher};
use crate::quality::{LaplacianQuality, QualityAnalyzer};

pub const NO_FACE_MESSAGE: &str = "No face detected in the image. Please try again.";
pub const VERIFY_NO_FACE_MESSAGE: &str = "No face detected in the image.";
pub const MULTIPLE_FACES_MESSAGE: &str =
    "Multiple faces detected. Please ensure only one face is visible.";
pub const NOT_ENROLLED_MESSAGE: &str = "No enrolled face found. Please enroll your face first.";
pub const RECOGNIZED_MESSAGE: &str = "Face recognized successfully";
pub const NOT_RECOGNIZED_MESSAGE: &str = "Face not recognized";
pub const ENROLLED_MESSAGE: &str = "Face enrolled successfully";

/// Result of an enrollment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrollmentOutcome {
    Enrolled {
        encoding: FaceEncoding,
        liveness: LivenessVerdict,
    },
    Rejected {
        message: String,
        liveness: LivenessVerdict,
    },
}

impl EnrollmentOutcome {
    pub fn is_enrolled(&self) -> bool {
        matches!(self, Self::Enrolled { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Enrolled { .. } => ENROLLED_MESSAGE,
            Self::Rejected { message, .. } => message,
        }
    }

    pub fn liveness(&self) -> &LivenessVerdict {
        match self {
            Self::Enrolled { liveness, .. } | Self::Rejected { liveness, .. } => liveness,
        }
    }
}

/// Result of a verification attempt against a stored encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub recognized: bool,
    pub liveness_passed: bool,
    /// Liveness confidence when liveness failed, match confidence after a
    /// comparison, `None` when rejected before either produced a score.
    pub confidence: Option<f64>,
    pub message: String,
    pub liveness: LivenessVerdict,
    pub match_result: Option<MatchResult>,
}

impl VerificationOutcome {
    fn rejected(liveness: LivenessVerdict, message: &str) -> Self {
        Self {
            recognized: false,
            liveness_passed: liveness.is_live,
            confidence: None,
            message: message.to_string(),
            liveness,
            match_result: None,
        }
    }
}

/// Owns the injected detector and the analysis stages.
///
/// Holds no per-request state; share it behind an `Arc` or move it onto a
/// worker thread.
pub struct FaceVerifier<D, Q = LaplacianQuality> {
    detector: D,
    liveness: LivenessEngine<Q>,
    encoder: FaceEncoder,
    matcher: EuclideanMatcher,
}

impl<D: LandmarkDetector> FaceVerifier<D, LaplacianQuality> {
    pub fn new(detector: D, config: PipelineConfig) -> Self {
        Self::with_quality(detector, config, LaplacianQuality)
    }
}

impl<D: LandmarkDetector, Q: QualityAnalyzer> FaceVerifier<D, Q> {
    pub fn with_quality(detector: D, config: PipelineConfig, quality: Q) -> Self {
        Self {
            detector,
            liveness: LivenessEngine::with_quality(config.liveness, quality),
            encoder: FaceEncoder::new(),
            matcher: EuclideanMatcher::new(config.matching),
        }
    }

    pub fn encoder(&self) -> &FaceEncoder {
        &self.encoder
    }

    pub fn matcher(&self) -> &EuclideanMatcher {
        &self.matcher
    }

    /// Run the detector, converting an error or a panic into a fault verdict.
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, LivenessVerdict> {
        let detected = panic::catch_unwind(AssertUnwindSafe(|| self.detector.detect(image)))
            .unwrap_or_else(|payload| Err(DetectorError::Panicked(panic_message(&*payload))));
        detected.map_err(|e| {
            tracing::warn!(error = %e, "landmark detection failed");
            LivenessVerdict::fault(e)
        })
    }

    pub fn assess_liveness(&self, image: &RgbImage) -> LivenessVerdict {
        match self.detect(image) {
            Ok(faces) => self.liveness.assess(image, faces.first()),
            Err(verdict) => verdict,
        }
    }

    /// Gate on liveness, require exactly one face, then encode it.
    pub fn enroll(&self, image: &RgbImage) -> EnrollmentOutcome {
        let faces = match self.detect(image) {
            Ok(faces) => faces,
            Err(liveness) => {
                let message = liveness.message.clone();
                return EnrollmentOutcome::Rejected { message, liveness };
            }
        };

        let liveness = self.liveness.assess(image, faces.first());
        if !liveness.is_live {
            let message = liveness.message.clone();
            return EnrollmentOutcome::Rejected { message, liveness };
        }

        let face = match single_face(&faces, NO_FACE_MESSAGE) {
            Ok(face) => face,
            Err(message) => {
                return EnrollmentOutcome::Rejected {
                    message: message.to_string(),
                    liveness,
                }
            }
        };

        let (width, height) = image.dimensions();
        let encoding = self.encoder.encode(image, face.bounding_box(width, height));
        tracing::info!(confidence = liveness.confidence, "enrollment encoding generated");

        EnrollmentOutcome::Enrolled { encoding, liveness }
    }

    /// Gate on liveness, encode the single face and compare it with `stored`.
    pub fn verify(&self, image: &RgbImage, stored: Option<&FaceEncoding>) -> VerificationOutcome {
        let faces = match self.detect(image) {
            Ok(faces) => faces,
            Err(liveness) => {
                let message = liveness.message.clone();
                return VerificationOutcome::rejected(liveness, &message);
            }
        };

        let liveness = self.liveness.assess(image, faces.first());
        if !liveness.is_live {
            let message = liveness.message.clone();
            let mut outcome = VerificationOutcome::rejected(liveness, &message);
            outcome.confidence = Some(outcome.liveness.confidence);
            return outcome;
        }

        let face = match single_face(&faces, VERIFY_NO_FACE_MESSAGE) {
            Ok(face) => face,
            Err(message) => return VerificationOutcome::rejected(liveness, message),
        };

        let Some(stored) = stored else {
            return VerificationOutcome::rejected(liveness, NOT_ENROLLED_MESSAGE);
        };

        let (width, height) = image.dimensions();
        let candidate = self.encoder.encode(image, face.bounding_box(width, height));
        let result = self.matcher.compare(stored, &candidate);

        tracing::info!(
            is_match = result.is_match,
            distance = result.normalized_distance,
            "face comparison completed"
        );

        VerificationOutcome {
            recognized: result.is_match,
            liveness_passed: true,
            confidence: Some(result.confidence()),
            message: if result.is_match {
                RECOGNIZED_MESSAGE
            } else {
                NOT_RECOGNIZED_MESSAGE
            }
            .to_string(),
            liveness,
            match_result: Some(result),
        }
    }
}

/// The only face in `faces`. Callers run this after liveness has passed, and
/// liveness already rejects an empty list, so `no_face` is a fallback that
/// the face-detected check normally pre-empts.
fn single_face<'a>(
    faces: &'a [LandmarkSet],
    no_face: &'static str,
) -> Result<&'a LandmarkSet, &'static str> {
    match faces {
        [] => Err(no_face),
        [face] => Ok(face),
        _ => Err(MULTIPLE_FACES_MESSAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::StaticDetector;
    use std::sync::atomic::{AtomicBool, Ordering};
    use crate::fixtures::{
        good_metrics, gradient_frame, live_face, live_face_with_ear, textured_frame, FixedQuality,
        FRAME_SIZE,
    };
    use crate::liveness::FailingCheck;
    use crate::quality::QualityMetrics;

    struct BrokenDetector;

    impl LandmarkDetector for BrokenDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
            Err(DetectorError::Failed("mesh runtime unavailable".into()))
        }
    }

    /// Panics on the first call, then serves a live face.
    struct FlakyDetector {
        tripped: AtomicBool,
    }

    impl LandmarkDetector for FlakyDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                panic!("mesh runtime crashed");
            }
            Ok(vec![live_face()])
        }
    }

    fn verifier(faces: Vec<LandmarkSet>) -> FaceVerifier<StaticDetector, FixedQuality> {
        FaceVerifier::with_quality(
            StaticDetector::new(faces),
            PipelineConfig::default(),
            FixedQuality(good_metrics()),
        )
    }

    fn frame() -> RgbImage {
        textured_frame(FRAME_SIZE, FRAME_SIZE)
    }

    #[test]
    fn test_assess_liveness_uses_first_face() {
        let v = verifier(vec![live_face(), live_face_with_ear(0.1)]);
        assert!(v.assess_liveness(&frame()).is_live);
    }

    #[test]
    fn test_assess_liveness_no_face() {
        let verdict = verifier(vec![]).assess_liveness(&frame());
        assert_eq!(verdict.failing_check, Some(FailingCheck::FaceDetected));
    }

    #[test]
    fn test_detector_error_becomes_fault_verdict() {
        let v = FaceVerifier::with_quality(
            BrokenDetector,
            PipelineConfig::default(),
            FixedQuality(good_metrics()),
        );
        let verdict = v.assess_liveness(&frame());
        assert!(!verdict.is_live);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(
            verdict.message,
            "Liveness detection error: detection failed: mesh runtime unavailable"
        );

        let outcome = v.verify(&frame(), Some(&FaceEncoding::zeros()));
        assert!(!outcome.recognized);
        assert!(!outcome.liveness_passed);
        assert!(outcome.message.starts_with("Liveness detection error"));

        assert!(!v.enroll(&frame()).is_enrolled());
    }

    #[test]
    fn test_detector_panic_becomes_fault_verdict() {
        let v = FaceVerifier::with_quality(
            FlakyDetector {
                tripped: AtomicBool::new(false),
            },
            PipelineConfig::default(),
            FixedQuality(good_metrics()),
        );
        let verdict = v.assess_liveness(&frame());
        assert!(!verdict.is_live);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.failing_check, Some(FailingCheck::Internal));
        assert_eq!(
            verdict.message,
            "Liveness detection error: detector panicked: mesh runtime crashed"
        );

        assert!(v.assess_liveness(&frame()).is_live);
    }

    #[test]
    fn test_single_face_messages() {
        assert_eq!(single_face(&[], NO_FACE_MESSAGE), Err(NO_FACE_MESSAGE));
        assert_eq!(
            single_face(&[], VERIFY_NO_FACE_MESSAGE),
            Err("No face detected in the image.")
        );
        let faces = [live_face(), live_face()];
        assert_eq!(
            single_face(&faces, VERIFY_NO_FACE_MESSAGE),
            Err(MULTIPLE_FACES_MESSAGE)
        );
        assert_eq!(single_face(&faces[..1], NO_FACE_MESSAGE), Ok(&faces[0]));
    }

    #[test]
    fn test_verify_rejects_multiple_faces() {
        let outcome =
            verifier(vec![live_face(), live_face()]).verify(&frame(), Some(&FaceEncoding::zeros()));
        assert!(outcome.liveness_passed);
        assert!(!outcome.recognized);
        assert_eq!(outcome.message, MULTIPLE_FACES_MESSAGE);
        assert_eq!(outcome.confidence, None);
    }

    #[test]
    fn test_enroll_live_face() {
        let outcome = verifier(vec![live_face()]).enroll(&frame());
        let EnrollmentOutcome::Enrolled { encoding, liveness } = outcome else {
            panic!("expected enrollment");
        };
        assert_eq!(encoding.len(), crate::ENCODING_DIM);
        assert!(!encoding.is_zero());
        assert!(liveness.is_live);
    }

    #[test]
    fn test_enroll_rejects_failed_liveness() {
        let outcome = verifier(vec![live_face_with_ear(0.1)]).enroll(&frame());
        assert!(!outcome.is_enrolled());
        assert!(outcome.message().contains("eyes naturally open"));
        assert_eq!(outcome.liveness().confidence, 0.8);
    }

    #[test]
    fn test_enroll_rejects_multiple_faces() {
        let outcome = verifier(vec![live_face(), live_face()]).enroll(&frame());
        assert_eq!(outcome.message(), MULTIPLE_FACES_MESSAGE);
        assert!(outcome.liveness().is_live);
    }

    #[test]
    fn test_verify_same_frame_is_recognized() {
        let v = verifier(vec![live_face()]);
        let EnrollmentOutcome::Enrolled { encoding, .. } = v.enroll(&frame()) else {
            panic!("expected enrollment");
        };

        let outcome = v.verify(&frame(), Some(&encoding));
        assert!(outcome.recognized);
        assert!(outcome.liveness_passed);
        assert_eq!(outcome.confidence, Some(1.0));
        assert_eq!(outcome.message, RECOGNIZED_MESSAGE);
        assert_eq!(outcome.match_result.unwrap().normalized_distance, 0.0);
    }

    #[test]
    fn test_verify_different_face_is_not_recognized() {
        let v = verifier(vec![live_face()]);
        let EnrollmentOutcome::Enrolled { encoding, .. } = v.enroll(&frame()) else {
            panic!("expected enrollment");
        };

        let other = gradient_frame(FRAME_SIZE, FRAME_SIZE);
        let outcome = v.verify(&other, Some(&encoding));
        assert!(outcome.liveness_passed);
        assert!(!outcome.recognized);
        assert_eq!(outcome.message, NOT_RECOGNIZED_MESSAGE);
        let result = outcome.match_result.unwrap();
        assert!(result.normalized_distance > 0.6);
        assert_eq!(outcome.confidence, Some(result.confidence()));
    }

    #[test]
    fn test_verify_without_enrollment() {
        let outcome = verifier(vec![live_face()]).verify(&frame(), None);
        assert!(!outcome.recognized);
        assert!(outcome.liveness_passed);
        assert_eq!(outcome.message, NOT_ENROLLED_MESSAGE);
        assert_eq!(outcome.confidence, None);
    }

    #[test]
    fn test_verify_reports_liveness_confidence() {
        let v = FaceVerifier::with_quality(
            StaticDetector::new(vec![live_face()]),
            PipelineConfig::default(),
            FixedQuality(QualityMetrics {
                brightness: 210.0,
                ..good_metrics()
            }),
        );
        let outcome = v.verify(&frame(), Some(&FaceEncoding::zeros()));
        assert!(!outcome.liveness_passed);
        assert_eq!(outcome.confidence, Some(0.3));
        assert!(outcome.message.starts_with("Poor lighting"));
        assert!(outcome.match_result.is_none());
    }

    #[test]
    fn test_verify_dimension_mismatch_is_worst_case() {
        let outcome = verifier(vec![live_face()]).verify(&frame(), Some(&FaceEncoding::new(vec![1.0; 12])));
        assert!(!outcome.recognized);
        assert_eq!(outcome.match_result, Some(MatchResult::failed()));
        assert_eq!(outcome.confidence, Some(0.0));
    }

    #[test]
    fn test_default_quality_pipeline() {
        let v = FaceVerifier::new(StaticDetector::new(vec![live_face()]), PipelineConfig::default());
        assert!(v.assess_liveness(&frame()).is_live);
    }
}
