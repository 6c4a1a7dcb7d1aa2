//! Color-order conversion at the analysis boundary.
//!
//! Cameras hand out BGR `Mat`s; the detection and recognition models expect
//! interleaved RGB. Conversion happens here, once per frame, so the rest of
//! the pipeline never sees BGR data.

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Convert a BGR frame to a contiguous interleaved RGB buffer.
///
/// Returns the buffer plus the frame dimensions.
pub fn mat_to_rgb(frame: &Mat) -> Result<(Vec<u8>, u32, u32), ConvertError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let data = rgb.data_bytes()?.to_vec();
    Ok((data, rgb.cols() as u32, rgb.rows() as u32))
}
