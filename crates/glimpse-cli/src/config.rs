use std::path::PathBuf;

/// Pipeline configuration, loaded from `GLIMPSE_*` environment variables.
/// CLI flags override individual fields.
pub struct Config {
    /// Directory of reference face images.
    pub known_dir: PathBuf,
    /// Camera device index.
    pub camera_index: i32,
    /// Annotated output video path.
    pub output_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Match threshold override; `None` uses the metric's default.
    pub threshold: Option<f32>,
}

impl Config {
    /// Load configuration from `GLIMPSE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("GLIMPSE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| glimpse_core::default_model_dir());

        Self {
            known_dir: std::env::var("GLIMPSE_KNOWN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("images/known")),
            camera_index: env_i32("GLIMPSE_CAMERA_INDEX", 0),
            output_path: std::env::var("GLIMPSE_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output.avi")),
            model_dir,
            threshold: std::env::var("GLIMPSE_MATCH_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
