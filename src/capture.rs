//! Screen capture collaborator.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, RgbaImage};
use xcap::Monitor;

use crate::vision::frame::Frame;

/// Anything that can hand out a fresh capture of the game window.
pub trait ScreenSource {
    fn capture(&mut self) -> Result<Frame>;
}

/// Captures a whole monitor through xcap.
pub struct MonitorCapture {
    monitor: Monitor,
}

impl MonitorCapture {
    /// The first monitor reported by the platform.
    pub fn primary() -> Result<Self> {
        Self::nth(0)
    }

    pub fn nth(index: usize) -> Result<Self> {
        let monitors = Monitor::all().map_err(|e| anyhow!("failed to enumerate monitors: {}", e))?;
        let count = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(index)
            .with_context(|| format!("display {} not found, only {} displays available", index, count))?;
        Ok(Self { monitor })
    }
}

impl ScreenSource for MonitorCapture {
    fn capture(&mut self) -> Result<Frame> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| anyhow!("screen capture failed: {}", e))?;
        let (w, h) = (shot.width(), shot.height());
        let rgba = RgbaImage::from_raw(w, h, shot.into_raw())
            .context("capture buffer does not match its dimensions")?;
        log::trace!("captured {}x{}", w, h);
        Ok(Frame::new(DynamicImage::ImageRgba8(rgba).to_rgb8()))
    }
}
