//! Captured frames and pixel-buffer helpers.

use chrono::{DateTime, Local};
use image::{GenericImageView, RgbImage};

use super::transform::Point;
use crate::error::VisionError;

/// An immutable capture of the display, tagged with its capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Local::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Per-pixel, per-channel minimum of two captures.
    ///
    /// Highlight animations brighten a frame; they rarely show up in two
    /// captures taken half a second apart, so the minimum removes them.
    pub fn min_combine(&self, other: &Frame) -> Result<Frame, VisionError> {
        if self.image.dimensions() != other.image.dimensions() {
            return Err(VisionError::InvariantViolation(format!(
                "frames differ in size: {:?} vs {:?}",
                self.image.dimensions(),
                other.image.dimensions()
            )));
        }
        let mut image = self.image.clone();
        for (a, b) in image.pixels_mut().zip(other.image.pixels()) {
            for c in 0..3 {
                a[c] = a[c].min(b[c]);
            }
        }
        let captured_at = self.captured_at.max(other.captured_at);
        Ok(Frame::with_timestamp(image, captured_at))
    }

    pub fn crop(&self, top_left: Point, bottom_right: Point) -> Option<RgbImage> {
        crop_clamped(&self.image, top_left, bottom_right)
    }
}

/// Copy of the `[top_left, bottom_right)` rectangle, clamped to the image.
/// Returns `None` when nothing of the rectangle lies inside the image.
pub fn crop_clamped(image: &RgbImage, top_left: Point, bottom_right: Point) -> Option<RgbImage> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = (top_left.x as i64).clamp(0, w);
    let y0 = (top_left.y as i64).clamp(0, h);
    let x1 = (bottom_right.x as i64).clamp(0, w);
    let y1 = (bottom_right.y as i64).clamp(0, h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(
        image
            .view(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
            .to_image(),
    )
}
