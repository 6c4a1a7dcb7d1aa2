use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glimpse_core::types::{
    CosineMatcher, EuclideanMatcher, MatchPredicate, DEFAULT_COSINE_THRESHOLD,
    DEFAULT_EUCLIDEAN_THRESHOLD,
};
use glimpse_core::{Engine, Gallery};
use glimpse_cv::{Camera, FrameSource, Headless, VideoSink, Window};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::Config;

const WINDOW_TITLE: &str = "Face Recognition";

#[derive(Parser)]
#[command(name = "glimpse", about = "Label known faces in a live camera feed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera, label faces, and record the annotated stream
    Run {
        /// Directory of reference face images (name = file stem)
        #[arg(long)]
        known_dir: Option<PathBuf>,
        /// Camera device index
        #[arg(long)]
        camera: Option<i32>,
        /// Annotated output video file (AVI)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Directory containing the ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Match threshold; defaults to the metric's standard operating point
        #[arg(long)]
        threshold: Option<f32>,
        /// Embedding comparison metric
        #[arg(long, value_enum, default_value = "cosine")]
        metric: Metric,
        /// Run without a preview window
        #[arg(long)]
        headless: bool,
    },
    /// Open a camera and report its negotiated properties
    Probe {
        /// Camera device index
        #[arg(long, default_value_t = 0)]
        camera: i32,
    },
    /// Load the known-faces directory and print what would be matched
    Known {
        /// Directory of reference face images
        #[arg(long)]
        known_dir: Option<PathBuf>,
        /// Directory containing the ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum Metric {
    /// Cosine similarity ≥ threshold
    Cosine,
    /// Euclidean distance ≤ threshold
    Euclidean,
}

impl Metric {
    fn matcher(self, threshold: Option<f32>) -> Box<dyn MatchPredicate + Send + Sync> {
        match self {
            Metric::Cosine => Box::new(CosineMatcher {
                threshold: threshold.unwrap_or(DEFAULT_COSINE_THRESHOLD),
            }),
            Metric::Euclidean => Box::new(EuclideanMatcher {
                threshold: threshold.unwrap_or(DEFAULT_EUCLIDEAN_THRESHOLD),
            }),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            known_dir,
            camera,
            output,
            model_dir,
            threshold,
            metric,
            headless,
        } => run_pipeline(known_dir, camera, output, model_dir, threshold, metric, headless),
        Commands::Probe { camera } => probe(camera),
        Commands::Known { known_dir, model_dir } => list_known(known_dir, model_dir),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    known_dir: Option<PathBuf>,
    camera: Option<i32>,
    output: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    threshold: Option<f32>,
    metric: Metric,
    headless: bool,
) -> Result<()> {
    let cfg = Config::from_env();
    let known_dir = known_dir.unwrap_or(cfg.known_dir);
    let camera_index = camera.unwrap_or(cfg.camera_index);
    let output = output.unwrap_or(cfg.output_path);
    let model_dir = model_dir.unwrap_or(cfg.model_dir);
    let threshold = threshold.or(cfg.threshold);

    let mut engine = Engine::load(&model_dir).context("loading face models")?;

    let gallery = Gallery::load(&known_dir, &mut engine, metric.matcher(threshold));
    session::ensure_known_faces(&gallery, &known_dir)?;

    let mut camera = Camera::open(camera_index).context("opening camera")?;
    let mut sink = VideoSink::create(&output, camera.fps(), camera.frame_size())
        .context("opening video sink")?;

    let summary = if headless {
        let mut preview = Headless;
        session::run(&mut camera, &mut engine, &gallery, &mut sink, &mut preview)?
    } else {
        let mut preview = Window::open(WINDOW_TITLE).context("opening preview window")?;
        session::run(&mut camera, &mut engine, &gallery, &mut sink, &mut preview)?
    };

    tracing::info!(
        output = %output.display(),
        frames = summary.frames,
        "annotated stream written"
    );
    Ok(())
}

fn probe(index: i32) -> Result<()> {
    let mut camera = Camera::open(index).context("opening camera")?;
    let size = camera.frame_size();
    println!(
        "camera {index}: {}x{} @ {:.1} fps",
        size.width,
        size.height,
        camera.fps()
    );
    camera.release();
    Ok(())
}

fn list_known(known_dir: Option<PathBuf>, model_dir: Option<PathBuf>) -> Result<()> {
    let cfg = Config::from_env();
    let known_dir = known_dir.unwrap_or(cfg.known_dir);
    let model_dir = model_dir.unwrap_or(cfg.model_dir);

    let mut engine = Engine::load(&model_dir).context("loading face models")?;
    let gallery = Gallery::load(&known_dir, &mut engine, Metric::Cosine.matcher(cfg.threshold));

    let out = serde_json::json!({
        "dir": known_dir.display().to_string(),
        "count": gallery.len(),
        "names": gallery.names(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
