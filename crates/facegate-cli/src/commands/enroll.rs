//! Enroll command - produce a storable encoding from a live capture.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use facegate_core::EnrollmentOutcome;
use facegate_engine::EngineConfig;

use super::{write_json, CaptureArgs, ExitCode};

#[derive(Args, Clone, Debug)]
pub struct EnrollArgs {
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// Also write the bare encoding array to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub async fn run(
    args: &EnrollArgs,
    config: &EngineConfig,
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let (image, engine) = args.capture.open(config)?;
    let outcome = engine.enroll(image).await?;

    if let (EnrollmentOutcome::Enrolled { encoding, .. }, Some(path)) = (&outcome, &args.out) {
        let json = serde_json::to_string(encoding)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write encoding to {}", path.display()))?;
        tracing::info!(path = %path.display(), "encoding saved");
    }

    if !outcome.is_enrolled() {
        tracing::info!(reason = outcome.message(), "enrollment rejected");
    }

    write_json(out, &outcome)?;
    Ok(ExitCode::from_verdict(outcome.is_enrolled()))
}
