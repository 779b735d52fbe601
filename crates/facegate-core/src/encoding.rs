//! Model-free face encoding.
//!
//! The face crop is converted to grayscale and resized to a 128x128 canvas,
//! then described by two cheap, deterministic feature groups:
//!
//! - a 32-bin intensity histogram (32 values)
//! - the first 96 local binary pattern codes in row-major order (96 values)
//!
//! No learned weights are involved, so the encoding is far less
//! discriminative than a neural embedding. It is compared only by Euclidean
//! distance and never interpreted element-wise.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::FaceBox;
use crate::quality::to_luma;

/// Length of every generated encoding.
pub const ENCODING_DIM: usize = 128;

/// Side of the normalized grayscale canvas.
const CANVAS_SIZE: u32 = 128;
const HISTOGRAM_BINS: usize = 32;
const LBP_FEATURES: usize = 96;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("face box {bbox:?} does not overlap the {width}x{height} image")]
    EmptyRegion { bbox: FaceBox, width: u32, height: u32 },
}

/// Fixed-length face feature vector. Serializes as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceEncoding {
    values: Vec<f64>,
}

impl FaceEncoding {
    /// Wrap stored values as-is. Length is checked at comparison time.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// The all-zero encoding produced when generation fails.
    pub fn zeros() -> Self {
        Self::new(vec![0.0; ENCODING_DIM])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for FaceEncoding {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Generates [`FaceEncoding`]s from RGB frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceEncoder;

impl FaceEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode the face inside `face_box`, or the whole frame when `None`.
    ///
    /// Always returns [`ENCODING_DIM`] values. Failures are logged and yield
    /// [`FaceEncoding::zeros`], which matches no real enrollment.
    pub fn encode(&self, image: &RgbImage, face_box: Option<FaceBox>) -> FaceEncoding {
        match self.try_encode(image, face_box) {
            Ok(encoding) => encoding,
            Err(e) => {
                tracing::warn!(error = %e, "face encoding failed, using zero vector");
                FaceEncoding::zeros()
            }
        }
    }

    pub fn try_encode(
        &self,
        image: &RgbImage,
        face_box: Option<FaceBox>,
    ) -> Result<FaceEncoding, EncodingError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodingError::EmptyImage { width, height });
        }

        let gray = to_luma(image);
        let face = match face_box {
            Some(bbox) => {
                let (x, y, w, h) = bbox.clamp_to(width, height).ok_or(
                    EncodingError::EmptyRegion {
                        bbox,
                        width,
                        height,
                    },
                )?;
                imageops::crop_imm(&gray, x, y, w, h).to_image()
            }
            None => gray,
        };

        let canvas = imageops::resize(&face, CANVAS_SIZE, CANVAS_SIZE, FilterType::Triangle);

        let mut features = Vec::with_capacity(ENCODING_DIM);
        features.extend(histogram(&canvas).map(f64::from));
        features.extend(
            lbp_codes(&canvas)
                .take(LBP_FEATURES)
                .map(f64::from),
        );
        features.resize(ENCODING_DIM, 0.0);

        Ok(FaceEncoding::new(features))
    }
}

/// Pixel counts over [`HISTOGRAM_BINS`] equal-width bins spanning 0..256.
fn histogram(gray: &GrayImage) -> [u32; HISTOGRAM_BINS] {
    let bin_width = 256 / HISTOGRAM_BINS;
    let mut bins = [0u32; HISTOGRAM_BINS];
    for &v in gray.as_raw() {
        bins[usize::from(v) / bin_width] += 1;
    }
    bins
}

/// 8-neighbour LBP codes for interior pixels, row-major.
///
/// Bit 7 is the top-left neighbour, proceeding clockwise to bit 0 on the
/// left. A bit is set when the neighbour is at least as bright as the centre.
fn lbp_codes(gray: &GrayImage) -> impl Iterator<Item = u8> + '_ {
    const NEIGHBOURS: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
    ];

    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let px = gray.as_raw();

    (1..h.saturating_sub(1))
        .flat_map(move |r| (1..w.saturating_sub(1)).map(move |c| (r, c)))
        .map(move |(r, c)| {
            let center = px[r * w + c];
            NEIGHBOURS.iter().fold(0u8, |code, &(dr, dc)| {
                let nr = r.wrapping_add_signed(dr);
                let nc = c.wrapping_add_signed(dc);
                (code << 1) | u8::from(px[nr * w + nc] >= center)
            })
        })
}
