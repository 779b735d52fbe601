//! Identity comparison between face encodings.
//!
//! Encodings are compared by Euclidean distance scaled by a normalization
//! constant. The default constant (1000) and tolerance (0.6) were tuned for
//! the histogram + LBP value range produced by [`crate::FaceEncoder`] and
//! should not be assumed to carry over to other feature scales.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::FaceEncoding;

/// Distance reported when a comparison cannot be computed.
pub const WORST_DISTANCE: f64 = 1.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("encoding length mismatch: stored {stored}, candidate {candidate}")]
    DimensionMismatch { stored: usize, candidate: usize },
    #[error("cannot compare empty encodings")]
    Empty,
    #[error("distance is not finite")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Maximum normalized distance accepted as a match, inclusive.
    pub tolerance: f64,
    /// Divisor applied to the raw Euclidean distance.
    pub normalization: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            tolerance: 0.6,
            normalization: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    pub normalized_distance: f64,
}

impl MatchResult {
    /// Non-match at [`WORST_DISTANCE`].
    pub fn failed() -> Self {
        Self {
            is_match: false,
            normalized_distance: WORST_DISTANCE,
        }
    }

    /// `1 - normalized_distance`. Negative when the distance exceeds 1;
    /// callers clamp as they see fit.
    pub fn confidence(&self) -> f64 {
        1.0 - self.normalized_distance
    }
}

/// Compares a stored encoding against a freshly captured one.
pub trait Matcher: Send + Sync {
    fn compare(&self, stored: &FaceEncoding, candidate: &FaceEncoding) -> MatchResult;
}

#[derive(Debug, Clone, Default)]
pub struct EuclideanMatcher {
    policy: MatchPolicy,
}

impl EuclideanMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Normalized distance, or why it could not be computed.
    pub fn try_distance(
        &self,
        stored: &FaceEncoding,
        candidate: &FaceEncoding,
    ) -> Result<f64, MatchError> {
        if stored.len() != candidate.len() {
            return Err(MatchError::DimensionMismatch {
                stored: stored.len(),
                candidate: candidate.len(),
            });
        }
        if stored.is_empty() {
            return Err(MatchError::Empty);
        }

        let squared: f64 = stored
            .values()
            .iter()
            .zip(candidate.values())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let distance = squared.sqrt() / self.policy.normalization;

        if !distance.is_finite() {
            return Err(MatchError::NonFinite);
        }
        Ok(distance)
    }
}

impl Matcher for EuclideanMatcher {
    fn compare(&self, stored: &FaceEncoding, candidate: &FaceEncoding) -> MatchResult {
        match self.try_distance(stored, candidate) {
            Ok(normalized_distance) => MatchResult {
                is_match: normalized_distance <= self.policy.tolerance,
                normalized_distance,
            },
            Err(e) => {
                tracing::warn!(error = %e, "face comparison failed");
                MatchResult::failed()
            }
        }
    }
}

/// Compare with the default normalization and the given tolerance.
pub fn match_encodings(
    stored: &FaceEncoding,
    candidate: &FaceEncoding,
    tolerance: f64,
) -> MatchResult {
    let policy = MatchPolicy {
        tolerance,
        ..MatchPolicy::default()
    };
    EuclideanMatcher::new(policy).compare(stored, candidate)
}
