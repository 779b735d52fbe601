//! Compare command - distance between two stored encodings.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use facegate_core::{EuclideanMatcher, MatchPolicy, MatchResult, Matcher};
use facegate_engine::EngineConfig;
use serde::Serialize;

use super::{load_encoding, write_json, ExitCode};

fn parse_tolerance(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value >= 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{value} must be a non-negative number"))
    }
}

#[derive(Args, Clone, Debug)]
pub struct CompareArgs {
    /// Stored encoding (JSON array)
    pub stored: PathBuf,

    /// Candidate encoding (JSON array)
    pub candidate: PathBuf,

    /// Override the configured match tolerance
    #[arg(short, long, value_parser = parse_tolerance)]
    pub tolerance: Option<f64>,
}

#[derive(Serialize)]
struct CompareReport {
    #[serde(flatten)]
    result: MatchResult,
    confidence: f64,
    tolerance: f64,
}

pub fn run(args: &CompareArgs, config: &EngineConfig, out: &mut dyn Write) -> Result<ExitCode> {
    let stored = load_encoding(&args.stored)?;
    let candidate = load_encoding(&args.candidate)?;

    let matching = &config.pipeline.matching;
    let policy = MatchPolicy {
        tolerance: args.tolerance.unwrap_or(matching.tolerance),
        ..matching.clone()
    };
    let tolerance = policy.tolerance;
    let result = EuclideanMatcher::new(policy).compare(&stored, &candidate);

    write_json(
        out,
        &CompareReport {
            result,
            confidence: result.confidence(),
            tolerance,
        },
    )?;
    Ok(ExitCode::from_verdict(result.is_match))
}
