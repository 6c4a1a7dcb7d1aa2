//! Webcam capture via OpenCV `videoio`, opened by integer device index.

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio;
use thiserror::Error;

/// Fallback frame rate when the device reports zero or an unusable value.
pub const DEFAULT_FPS: f64 = 20.0;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("cannot open camera at index {0}")]
    OpenFailed(i32),
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Source of frames for the recognition session.
///
/// Behind a trait so the session loop can run against a test double.
pub trait FrameSource {
    /// Next frame, or `None` when a read fails or the stream ends.
    fn grab(&mut self) -> Result<Option<Mat>, CaptureError>;

    /// Release the underlying device. Called exactly once by the session.
    fn release(&mut self);
}

/// A camera device opened by integer index, with probed frame geometry.
pub struct Camera {
    inner: videoio::VideoCapture,
    index: i32,
    width: i32,
    height: i32,
    fps: f64,
}

impl Camera {
    /// Open the camera at `index` and probe its frame size and FPS.
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        let inner = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !inner.is_opened()? {
            return Err(CaptureError::OpenFailed(index));
        }

        let width = inner.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = inner.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let fps = effective_fps(inner.get(videoio::CAP_PROP_FPS)?);

        tracing::info!(index, width, height, fps, "camera opened");

        Ok(Self { inner, index, width, height, fps })
    }

    /// Probed frame size, as needed by the video sink.
    pub fn frame_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Probed FPS, already defaulted when the device reported none.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSource for Camera {
    fn grab(&mut self) -> Result<Option<Mat>, CaptureError> {
        let mut frame = Mat::default();
        let ok = self.inner.read(&mut frame)?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if let Err(e) = self.inner.release() {
            tracing::warn!(index = self.index, error = %e, "camera release failed");
        }
    }
}

/// Devices commonly report 0 (or garbage) for FPS; fall back to [`DEFAULT_FPS`].
fn effective_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported >= 1.0 {
        reported
    } else {
        DEFAULT_FPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_fps_passthrough() {
        assert_eq!(effective_fps(30.0), 30.0);
        assert_eq!(effective_fps(29.97), 29.97);
    }

    #[test]
    fn test_effective_fps_zero_falls_back() {
        assert_eq!(effective_fps(0.0), DEFAULT_FPS);
    }

    #[test]
    fn test_effective_fps_garbage_falls_back() {
        assert_eq!(effective_fps(f64::NAN), DEFAULT_FPS);
        assert_eq!(effective_fps(-1.0), DEFAULT_FPS);
        assert_eq!(effective_fps(0.5), DEFAULT_FPS);
    }
}
