use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::liveness::LivenessPolicy;
use crate::matcher::MatchPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Thresholds for the whole verification pipeline.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```toml
/// [liveness]
/// min_face_size = 120
///
/// [matching]
/// tolerance = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub liveness: LivenessPolicy,
    pub matching: MatchPolicy,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    /// Optional file, then `FACEGATE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `FACEGATE_*` keys. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let l = &mut self.liveness;
        l.min_face_size = parse_or(&lookup, "FACEGATE_MIN_FACE_SIZE", l.min_face_size);
        l.min_blur_score = parse_or(&lookup, "FACEGATE_MIN_BLUR_SCORE", l.min_blur_score);
        l.min_brightness = parse_or(&lookup, "FACEGATE_MIN_BRIGHTNESS", l.min_brightness);
        l.max_brightness = parse_or(&lookup, "FACEGATE_MAX_BRIGHTNESS", l.max_brightness);
        l.min_contrast = parse_or(&lookup, "FACEGATE_MIN_CONTRAST", l.min_contrast);
        l.max_head_rotation = parse_or(&lookup, "FACEGATE_MAX_HEAD_ROTATION", l.max_head_rotation);
        l.min_ear = parse_or(&lookup, "FACEGATE_MIN_EAR", l.min_ear);
        l.max_ear = parse_or(&lookup, "FACEGATE_MAX_EAR", l.max_ear);

        let m = &mut self.matching;
        m.tolerance = parse_or(&lookup, "FACEGATE_MATCH_TOLERANCE", m.tolerance);
        m.normalization = parse_or(&lookup, "FACEGATE_MATCH_NORMALIZATION", m.normalization);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.liveness;
        if l.min_brightness > l.max_brightness {
            return Err(ConfigError::Invalid(format!(
                "brightness band is inverted: {} > {}",
                l.min_brightness, l.max_brightness
            )));
        }
        if l.min_ear > l.max_ear {
            return Err(ConfigError::Invalid(format!(
                "EAR band is inverted: {} > {}",
                l.min_ear, l.max_ear
            )));
        }
        if !(l.max_head_rotation >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_head_rotation must be non-negative, got {}",
                l.max_head_rotation
            )));
        }
        let m = &self.matching;
        if !(m.normalization > 0.0 && m.normalization.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "matching normalization must be positive, got {}",
                m.normalization
            )));
        }
        if !(m.tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "matching tolerance must be non-negative, got {}",
                m.tolerance
            )));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
