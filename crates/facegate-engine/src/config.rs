use std::path::{Path, PathBuf};

use facegate_core::{ConfigError, PipelineConfig};

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pipeline thresholds: the config file if any, then `FACEGATE_*`
    /// overrides.
    pub pipeline: PipelineConfig,
    /// Requests that may wait for the engine thread (default: 16).
    pub queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

const DEFAULT_QUEUE_DEPTH: usize = 16;

impl EngineConfig {
    /// Load with the config file named by `FACEGATE_CONFIG`, if set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load with `config_path`, falling back to `FACEGATE_CONFIG`.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("FACEGATE_CONFIG").ok().map(PathBuf::from);
        let path = config_path.or(env_path.as_deref());
        let pipeline = PipelineConfig::load(path)?;

        Ok(Self {
            pipeline,
            queue_depth: env_usize("FACEGATE_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH).max(1),
        })
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
