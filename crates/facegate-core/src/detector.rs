//! Landmark detector capability.
//!
//! Facegate never localizes landmarks itself. A detector backed by a loaded
//! face-mesh model is injected into [`crate::FaceVerifier`]; it is acquired
//! once and then shared read-only across concurrent requests.
//!
//! # Preconditions
//!
//! Implementations must be safe to call from several threads at once
//! (`Send + Sync`, `&self`). Whether the underlying model runtime tolerates
//! concurrent inference is the implementor's responsibility.

use std::any::Any;
use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::landmarks::LandmarkSet;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection failed: {0}")]
    Failed(String),
    #[error("failed to read landmarks from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid landmark data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("detector panicked: {0}")]
    Panicked(String),
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub trait LandmarkDetector: Send + Sync {
    /// Landmark sets for every face in `image`, most prominent first.
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
        (**self).detect(image)
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for std::sync::Arc<D> {
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
        (**self).detect(image)
    }
}

/// Serves landmark sets computed ahead of time, ignoring the frame.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    faces: Vec<LandmarkSet>,
}

impl StaticDetector {
    pub fn new(faces: Vec<LandmarkSet>) -> Self {
        Self { faces }
    }

    /// A detector that finds no face.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON array of faces, each an array of `{"x", "y"}` points.
    pub fn from_json(json: &str) -> Result<Self, DetectorError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_file(path: &Path) -> Result<Self, DetectorError> {
        let json = std::fs::read_to_string(path).map_err(|source| DetectorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn faces(&self) -> &[LandmarkSet] {
        &self.faces
    }
}

impl LandmarkDetector for StaticDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<LandmarkSet>, DetectorError> {
        Ok(self.faces.clone())
    }
}
