//! glimpse-core — Face detection and recognition engine.
//!
//! Uses SCRFD for face detection and ArcFace for face recognition,
//! both running via ONNX Runtime for CPU inference, plus the known-face
//! gallery loaded from a directory of reference images.

pub mod alignment;
pub mod detector;
pub mod engine;
pub mod gallery;
pub mod recognizer;
pub mod types;

pub use engine::{Engine, FaceAnalyzer};
pub use gallery::Gallery;
pub use types::{
    CosineMatcher, DetectedFace, Embedding, EuclideanMatcher, FaceBox, KnownFace, MatchPredicate,
};

use std::path::PathBuf;

/// Default directory for ONNX model files: `$XDG_DATA_HOME/glimpse/models`
/// (or `~/.local/share/glimpse/models`).
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("glimpse/models")
}
