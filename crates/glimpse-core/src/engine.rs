//! Detection + recognition engine behind the [`FaceAnalyzer`] seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::DetectedFace;
use std::path::Path;
use thiserror::Error;

/// SCRFD detection model file name.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Finds every face in an RGB frame and computes its embedding.
///
/// The session loop and the known-face loader both depend on this seam,
/// so tests can substitute a stub for the ONNX-backed [`Engine`].
pub trait FaceAnalyzer {
    /// Detect all faces in an interleaved RGB frame and extract one
    /// embedding per face, in detection-confidence order.
    fn analyze(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<DetectedFace>, EngineError>;
}

/// ONNX-backed analyzer: SCRFD detection + ArcFace embedding extraction.
pub struct Engine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl Engine {
    /// Load both models from `model_dir`. Fails fast if either file is missing.
    pub fn load(model_dir: &Path) -> Result<Self, EngineError> {
        let detector_path = model_dir.join(DETECTOR_MODEL_FILE);
        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        tracing::info!(path = %detector_path.display(), "SCRFD detector loaded");

        let recognizer_path = model_dir.join(RECOGNIZER_MODEL_FILE);
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;
        tracing::info!(path = %recognizer_path.display(), "ArcFace recognizer loaded");

        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for Engine {
    fn analyze(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<DetectedFace>, EngineError> {
        let boxes = self.detector.detect(rgb, width, height)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            if bbox.landmarks.is_none() {
                // Cannot align without landmarks; skip this face, keep the frame going.
                tracing::debug!(confidence = bbox.confidence, "face without landmarks skipped");
                continue;
            }
            let embedding = self.recognizer.extract(rgb, width, height, &bbox)?;
            faces.push(DetectedFace { bbox, embedding });
        }

        Ok(faces)
    }
}
