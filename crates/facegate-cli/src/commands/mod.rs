//! CLI command definitions and shared helpers.

pub mod compare;
pub mod encode;
pub mod enroll;
pub mod liveness;
pub mod verify;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facegate_core::{FaceEncoding, FaceVerifier, StaticDetector};
use facegate_engine::{spawn_engine, EngineConfig, EngineHandle};
use image::RgbImage;
use serde::Serialize;

/// Facegate - liveness screening and face matching
#[derive(Parser)]
#[command(name = "facegate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML file with liveness and matching thresholds [env: FACEGATE_CONFIG]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the liveness checks on a capture
    Liveness(CaptureArgs),
    /// Generate an enrollment encoding from a live capture
    Enroll(enroll::EnrollArgs),
    /// Verify a live capture against an enrolled encoding
    Verify(verify::VerifyArgs),
    /// Compare two stored encodings
    Compare(compare::CompareArgs),
    /// Encode a face region without liveness checks
    Encode(encode::EncodeArgs),
}

/// A frame plus the landmarks detected in it.
#[derive(Args, Clone, Debug)]
pub struct CaptureArgs {
    /// Captured frame (any format the image crate decodes)
    pub image: PathBuf,

    /// JSON array of faces, each an array of normalized {"x", "y"} points
    #[arg(short, long)]
    pub landmarks: PathBuf,
}

impl CaptureArgs {
    /// Load the frame and start an engine serving its landmarks.
    pub fn open(&self, config: &EngineConfig) -> Result<(RgbImage, EngineHandle)> {
        let image = load_image(&self.image)?;
        let detector = StaticDetector::from_file(&self.landmarks)?;
        tracing::debug!(faces = detector.faces().len(), "landmarks loaded");

        let verifier = FaceVerifier::new(detector, config.pipeline.clone());
        let engine = spawn_engine(verifier, config.queue_depth)?;
        Ok((image, engine))
    }
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Live, enrolled, recognized or matched.
    Success = 0,
    /// The capture was rejected or did not match.
    Negative = 1,
    /// Invalid input or an internal failure.
    Error = 2,
}

impl ExitCode {
    pub fn from_verdict(positive: bool) -> Self {
        if positive {
            Self::Success
        } else {
            Self::Negative
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// `--config` wins over `FACEGATE_CONFIG`; `FACEGATE_*` overrides apply to both.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = EngineConfig::load(path)?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(image.to_rgb8())
}

pub fn load_encoding(path: &Path) -> Result<FaceEncoding> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read encoding {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid encoding in {}", path.display()))
}

pub fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use facegate_core::fixtures::{live_face, live_face_with_ear, textured_frame, FRAME_SIZE};
    use facegate_core::LandmarkSet;

    /// Scratch directory holding a textured frame and landmark sidecars.
    pub struct Scratch {
        pub dir: PathBuf,
    }

    impl Scratch {
        pub fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "facegate-cli-{name}-{}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            textured_frame(FRAME_SIZE, FRAME_SIZE)
                .save(dir.join("frame.png"))
                .unwrap();
            Self { dir }
        }

        pub fn frame(&self) -> PathBuf {
            self.dir.join("frame.png")
        }

        pub fn landmarks(&self, name: &str, faces: &[LandmarkSet]) -> PathBuf {
            let path = self.dir.join(name);
            std::fs::write(&path, serde_json::to_string(faces).unwrap()).unwrap();
            path
        }

        pub fn live(&self) -> PathBuf {
            self.landmarks("live.json", &[live_face()])
        }

        pub fn closed_eyes(&self) -> PathBuf {
            self.landmarks("closed.json", &[live_face_with_ear(0.1)])
        }

        pub fn path(&self, name: &str) -> PathBuf {
            self.dir.join(name)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    pub fn output_json(out: &[u8]) -> serde_json::Value {
        serde_json::from_slice(out).unwrap()
    }
}
