//! Encode command - raw encoding of a frame or region, no liveness gate.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use facegate_core::{FaceBox, FaceEncoder};

use super::{load_image, write_json, ExitCode};

/// Parse `left,top,right,bottom` pixel coordinates.
fn parse_bbox(s: &str) -> Result<FaceBox, String> {
    let parts: Vec<i64> = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse()
                .map_err(|_| format!("'{p}' is not an integer"))
        })
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [left, top, right, bottom] if left < right && top < bottom => {
            Ok(FaceBox::new(left, top, right, bottom))
        }
        [_, _, _, _] => Err(format!("'{s}' is empty: right/bottom must exceed left/top")),
        _ => Err(format!("expected left,top,right,bottom, got '{s}'")),
    }
}

#[derive(Args, Clone, Debug)]
pub struct EncodeArgs {
    /// Image to encode
    pub image: PathBuf,

    /// Face region as left,top,right,bottom pixels (whole frame if omitted)
    #[arg(short, long, value_parser = parse_bbox)]
    pub bbox: Option<FaceBox>,
}

pub fn run(args: &EncodeArgs, out: &mut dyn Write) -> Result<ExitCode> {
    let image = load_image(&args.image)?;
    let encoding = FaceEncoder::new().try_encode(&image, args.bbox)?;
    write_json(out, &encoding)?;
    Ok(ExitCode::Success)
}
