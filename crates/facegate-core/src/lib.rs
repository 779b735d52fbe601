//! Core face verification for attendance capture.
//!
//! Given an RGB frame and the landmark sets an injected [`LandmarkDetector`]
//! finds in it, facegate decides whether the capture is a live, well-posed
//! face ([`LivenessEngine`]), derives a fixed-length [`FaceEncoding`] from
//! the face region ([`FaceEncoder`]) and compares encodings by normalized
//! Euclidean distance ([`EuclideanMatcher`]). [`FaceVerifier`] wires the
//! stages together for enrollment and verification.
//!
//! All stages are stateless after construction and safe to share across
//! threads.

pub mod config;
pub mod detector;
pub mod ear;
pub mod encoding;
pub mod geometry;
pub mod landmarks;
pub mod liveness;
pub mod matcher;
pub mod pipeline;
pub mod pose;
pub mod quality;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use config::{ConfigError, PipelineConfig};
pub use detector::{DetectorError, LandmarkDetector, StaticDetector};
pub use ear::{compute_ear, EarValues};
pub use encoding::{EncodingError, FaceEncoder, FaceEncoding, ENCODING_DIM};
pub use geometry::Point;
pub use landmarks::{FaceBox, LandmarkSet};
pub use liveness::{
    FailingCheck, LivenessChecks, LivenessEngine, LivenessPolicy, LivenessVerdict, QualityIssue,
};
pub use matcher::{match_encodings, EuclideanMatcher, MatchError, MatchPolicy, MatchResult, Matcher};
pub use pipeline::{EnrollmentOutcome, FaceVerifier, VerificationOutcome};
pub use pose::{estimate_pose, PoseAngles, PoseError};
pub use quality::{assess_quality, LaplacianQuality, QualityAnalyzer, QualityMetrics};
