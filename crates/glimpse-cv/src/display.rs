//! Live preview window with quit-key polling via OpenCV `highgui`.

use opencv::core::Mat;
use opencv::highgui;
use thiserror::Error;

/// Pressing this key in the preview window requests a graceful shutdown.
pub const QUIT_KEY: char = 'q';

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Mirror of the annotated stream, with a quit-key poll each frame.
///
/// Behind a trait so headless runs and tests share the session loop.
pub trait Preview {
    fn show(&mut self, frame: &Mat) -> Result<(), DisplayError>;

    /// Poll for the quit key. Non-blocking beyond a 1 ms key wait.
    fn quit_requested(&mut self) -> Result<bool, DisplayError>;

    /// Close the display surface. Called exactly once by the session.
    fn release(&mut self);
}

/// A `highgui` window showing the annotated live feed.
pub struct Window {
    title: String,
}

impl Window {
    pub fn open(title: &str) -> Result<Self, DisplayError> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { title: title.to_string() })
    }
}

impl Preview for Window {
    fn show(&mut self, frame: &Mat) -> Result<(), DisplayError> {
        highgui::imshow(&self.title, frame)?;
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        let key = highgui::wait_key(1)?;
        Ok(key > 0 && (key & 0xFF) as u8 == QUIT_KEY as u8)
    }

    fn release(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.title) {
            tracing::warn!(title = %self.title, error = %e, "window close failed");
        }
    }
}

/// No-op preview for `--headless` runs: shows nothing, never quits.
pub struct Headless;

impl Preview for Headless {
    fn show(&mut self, _frame: &Mat) -> Result<(), DisplayError> {
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        Ok(false)
    }

    fn release(&mut self) {}
}
