//! glimpse-cv — Capture and output seam over OpenCV.
//!
//! Camera opened by integer index, XVID/AVI video sink, preview window with
//! quit-key polling, BGR→RGB conversion, and overlay drawing. The source,
//! sink, and preview are traits so the session loop can be driven by test
//! doubles.

pub mod camera;
pub mod convert;
pub mod display;
pub mod overlay;
pub mod writer;

pub use camera::{Camera, CaptureError, FrameSource, DEFAULT_FPS};
pub use convert::{mat_to_rgb, ConvertError};
pub use display::{DisplayError, Headless, Preview, Window, QUIT_KEY};
pub use overlay::{label_face, OverlayError};
pub use writer::{FrameSink, SinkError, VideoSink};
