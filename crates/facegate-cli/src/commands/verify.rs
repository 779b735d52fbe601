//! Verify command - match a live capture against an enrolled encoding.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use facegate_engine::EngineConfig;

use super::{load_encoding, write_json, CaptureArgs, ExitCode};

#[derive(Args, Clone, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// Enrolled encoding (JSON array), as written by `enroll --out`
    #[arg(short, long)]
    pub enrolled: PathBuf,
}

pub async fn run(
    args: &VerifyArgs,
    config: &EngineConfig,
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let stored = load_encoding(&args.enrolled)?;
    let (image, engine) = args.capture.open(config)?;
    let outcome = engine.verify(image, Some(stored)).await?;

    tracing::info!(
        recognized = outcome.recognized,
        liveness_passed = outcome.liveness_passed,
        confidence = ?outcome.confidence,
        "verification completed"
    );

    write_json(out, &outcome)?;
    Ok(ExitCode::from_verdict(outcome.recognized))
}
