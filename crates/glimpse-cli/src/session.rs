//! The recognition session: one sequential capture → analyze → annotate →
//! write → display loop, with deterministic resource release on every exit
//! path.

use glimpse_core::engine::EngineError;
use glimpse_core::types::FaceBox;
use glimpse_core::{FaceAnalyzer, Gallery};
use glimpse_cv::{
    convert, overlay, CaptureError, ConvertError, DisplayError, FrameSink, FrameSource,
    OverlayError, Preview, SinkError,
};
use opencv::core::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label used for faces that match no known embedding.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no known faces loaded from {0} — check the known-faces directory")]
    NoKnownFaces(PathBuf),
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),
    #[error("color conversion: {0}")]
    Convert(#[from] ConvertError),
    #[error("analysis: {0}")]
    Analyze(#[from] EngineError),
    #[error("overlay: {0}")]
    Overlay(#[from] OverlayError),
    #[error("video sink: {0}")]
    Sink(#[from] SinkError),
    #[error("display: {0}")]
    Display(#[from] DisplayError),
}

/// Counters reported when the session ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionSummary {
    /// Frames written to the sink.
    pub frames: u64,
    /// Faces detected across all frames.
    pub faces: u64,
    /// Detected faces that matched a known name.
    pub matched: u64,
}

/// The camera loop must not start without reference faces.
pub fn ensure_known_faces(gallery: &Gallery, dir: &Path) -> Result<(), SessionError> {
    if gallery.is_empty() {
        Err(SessionError::NoKnownFaces(dir.to_path_buf()))
    } else {
        Ok(())
    }
}

/// Run the recognition loop until the quit key, end of stream, or an error.
///
/// Whatever the outcome, `source`, `sink`, and `preview` are each released
/// exactly once before this returns.
pub fn run<S, A, W, P>(
    source: &mut S,
    analyzer: &mut A,
    gallery: &Gallery,
    sink: &mut W,
    preview: &mut P,
) -> Result<SessionSummary, SessionError>
where
    S: FrameSource,
    A: FaceAnalyzer,
    W: FrameSink,
    P: Preview,
{
    let result = drive(source, analyzer, gallery, sink, preview);

    source.release();
    sink.release();
    preview.release();

    if let Ok(summary) = &result {
        tracing::info!(
            frames = summary.frames,
            faces = summary.faces,
            matched = summary.matched,
            "session complete"
        );
    }
    result
}

fn drive<S, A, W, P>(
    source: &mut S,
    analyzer: &mut A,
    gallery: &Gallery,
    sink: &mut W,
    preview: &mut P,
) -> Result<SessionSummary, SessionError>
where
    S: FrameSource,
    A: FaceAnalyzer,
    W: FrameSink,
    P: Preview,
{
    let mut summary = SessionSummary::default();

    loop {
        let Some(mut frame) = source.grab()? else {
            tracing::warn!("failed to grab frame; stopping");
            break;
        };

        let (rgb, width, height) = convert::mat_to_rgb(&frame)?;
        let detected = analyzer.analyze(&rgb, width, height)?;

        for face in &detected {
            let label = gallery.identify(&face.embedding);
            if label.is_some() {
                summary.matched += 1;
            }
            let name = label.unwrap_or(UNKNOWN_LABEL);
            overlay::label_face(&mut frame, face_rect(&face.bbox), name)?;
        }
        summary.faces += detected.len() as u64;

        sink.write(&frame)?;
        preview.show(&frame)?;
        summary.frames += 1;

        if preview.quit_requested()? {
            tracing::info!("quit key received; stopping");
            break;
        }
    }

    Ok(summary)
}

fn face_rect(bbox: &FaceBox) -> Rect {
    Rect::new(
        bbox.left.round() as i32,
        bbox.top.round() as i32,
        bbox.width().round() as i32,
        bbox.height().round() as i32,
    )
}
