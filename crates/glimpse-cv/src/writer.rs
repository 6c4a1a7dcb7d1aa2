//! Annotated-stream output: an XVID-encoded AVI via OpenCV `VideoWriter`.

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("cannot open video sink at {0}")]
    OpenFailed(PathBuf),
    #[error("video sink path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Destination for annotated frames.
///
/// Behind a trait so the session loop can run against a test double.
pub trait FrameSink {
    fn write(&mut self, frame: &Mat) -> Result<(), SinkError>;

    /// Flush and close the sink. Called exactly once by the session.
    fn release(&mut self);
}

/// File-backed sink: XVID codec in an AVI container, sized to the camera's
/// probed geometry so frames pass through unscaled.
pub struct VideoSink {
    inner: videoio::VideoWriter,
    path: PathBuf,
}

impl VideoSink {
    pub fn create(path: &Path, fps: f64, frame_size: Size) -> Result<Self, SinkError> {
        let Some(path_str) = path.to_str() else {
            return Err(SinkError::InvalidPath(path.to_path_buf()));
        };

        let fourcc = videoio::VideoWriter::fourcc('X', 'V', 'I', 'D')?;
        let inner = videoio::VideoWriter::new(path_str, fourcc, fps, frame_size, true)?;
        if !inner.is_opened()? {
            return Err(SinkError::OpenFailed(path.to_path_buf()));
        }

        tracing::info!(
            path = %path.display(),
            fps,
            width = frame_size.width,
            height = frame_size.height,
            "video sink opened"
        );

        Ok(Self { inner, path: path.to_path_buf() })
    }
}

impl FrameSink for VideoSink {
    fn write(&mut self, frame: &Mat) -> Result<(), SinkError> {
        self.inner.write(frame)?;
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.inner.release() {
            tracing::warn!(path = %self.path.display(), error = %e, "video sink release failed");
        }
    }
}
