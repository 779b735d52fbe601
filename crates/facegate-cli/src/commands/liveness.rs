//! Liveness command - screen a capture without touching encodings.

use std::io::Write;

use anyhow::Result;
use facegate_engine::EngineConfig;

use super::{write_json, CaptureArgs, ExitCode};

pub async fn run(
    args: &CaptureArgs,
    config: &EngineConfig,
    out: &mut dyn Write,
) -> Result<ExitCode> {
    let (image, engine) = args.open(config)?;
    let verdict = engine.liveness(image).await?;

    tracing::info!(
        is_live = verdict.is_live,
        confidence = verdict.confidence,
        "liveness assessed"
    );

    write_json(out, &verdict)?;
    Ok(ExitCode::from_verdict(verdict.is_live))
}
