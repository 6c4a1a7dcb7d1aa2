//! Overlay drawing: bounding box plus a filled name strip under each face.

use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::imgproc;
use thiserror::Error;

const BOX_THICKNESS: i32 = 2;
/// Height of the filled label strip along the bottom edge of the face box.
const LABEL_STRIP_HEIGHT: i32 = 35;
const TEXT_INSET_X: i32 = 6;
const TEXT_INSET_Y: i32 = 6;
const FONT_SCALE: f64 = 1.0;
const TEXT_THICKNESS: i32 = 1;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Draw a face box with its name label onto `frame` in place.
///
/// Green rectangle around the face, black strip across the bottom
/// `LABEL_STRIP_HEIGHT` pixels of the box, white name text inset into the
/// strip. OpenCV clips drawing at frame edges, so partially off-screen
/// boxes are safe.
pub fn label_face(frame: &mut Mat, face: Rect, name: &str) -> Result<(), OverlayError> {
    let box_color = Scalar::new(0.0, 255.0, 0.0, 0.0); // BGR green
    let strip_color = Scalar::new(0.0, 0.0, 0.0, 0.0); // black
    let text_color = Scalar::new(255.0, 255.0, 255.0, 0.0); // white

    imgproc::rectangle(frame, face, box_color, BOX_THICKNESS, imgproc::LINE_8, 0)?;

    let strip = Rect::new(
        face.x,
        face.y + face.height - LABEL_STRIP_HEIGHT,
        face.width,
        LABEL_STRIP_HEIGHT,
    );
    imgproc::rectangle(frame, strip, strip_color, imgproc::FILLED, imgproc::LINE_8, 0)?;

    let origin = Point::new(face.x + TEXT_INSET_X, face.y + face.height - TEXT_INSET_Y);
    imgproc::put_text(
        frame,
        name,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        text_color,
        TEXT_THICKNESS,
        imgproc::LINE_8,
        false,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Vec3b};
    use opencv::prelude::*;

    fn black_frame(rows: i32, cols: i32) -> Mat {
        Mat::zeros(rows, cols, core::CV_8UC3).unwrap().to_mat().unwrap()
    }

    fn pixel(frame: &Mat, row: i32, col: i32) -> Vec3b {
        *frame.at_2d::<Vec3b>(row, col).unwrap()
    }

    #[test]
    fn test_box_border_is_green() {
        let mut frame = black_frame(100, 100);
        label_face(&mut frame, Rect::new(10, 10, 60, 60), "a").unwrap();

        let top_border = pixel(&frame, 10, 40);
        assert_eq!(top_border[0], 0);
        assert_eq!(top_border[1], 255);
        assert_eq!(top_border[2], 0);

        // Row 20 sits above the label strip, so the left border is intact there.
        let left_border = pixel(&frame, 20, 10);
        assert_eq!(left_border[1], 255);
    }

    #[test]
    fn test_label_text_renders_white_pixels() {
        let mut frame = black_frame(100, 100);
        label_face(&mut frame, Rect::new(10, 10, 60, 60), "a").unwrap();

        // The strip spans rows 35..70, cols 10..70; text starts at (16, 64).
        let mut white = 0usize;
        for row in 35..70 {
            for col in 10..70 {
                let px = pixel(&frame, row, col);
                if px[0] == 255 && px[1] == 255 && px[2] == 255 {
                    white += 1;
                }
            }
        }
        assert!(white > 0, "expected white text pixels in the label strip");
    }

    #[test]
    fn test_strip_corner_away_from_text_is_black() {
        let mut frame = black_frame(100, 100);
        label_face(&mut frame, Rect::new(10, 10, 60, 60), "a").unwrap();

        // Far corner of the strip, out of reach of a single glyph.
        let px = pixel(&frame, 68, 65);
        assert_eq!(px, Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_partially_offscreen_box_is_clipped() {
        let mut frame = black_frame(50, 50);
        // Box extends past the right and bottom edges; must not error.
        label_face(&mut frame, Rect::new(30, 30, 40, 40), "edge").unwrap();

        let px = pixel(&frame, 30, 45);
        assert_eq!(px[1], 255);
    }

    #[test]
    fn test_unknown_label_renders() {
        let mut frame = black_frame(200, 200);
        label_face(&mut frame, Rect::new(20, 20, 150, 150), "Unknown").unwrap();

        let border = pixel(&frame, 20, 90);
        assert_eq!(border[1], 255);
    }
}
