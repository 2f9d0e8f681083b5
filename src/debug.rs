//! Debug visualization side channel.
//!
//! Components never open windows. When debugging is enabled they render
//! their intermediate state into an image and hand it to a [`DebugSink`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

pub const SOFT_RED: Rgb<u8> = Rgb([255, 117, 113]);
pub const SOFT_GREEN: Rgb<u8> = Rgb([185, 225, 105]);
pub const SOFT_YELLOW: Rgb<u8> = Rgb([255, 222, 102]);

pub trait DebugSink {
    /// Whether images are wanted at all; lets callers skip rendering.
    fn enabled(&self) -> bool {
        true
    }

    fn emit(&mut self, stage: &str, image: &RgbImage);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn enabled(&self) -> bool {
        false
    }

    fn emit(&mut self, _stage: &str, _image: &RgbImage) {}
}

/// Keeps every emitted image in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub images: Vec<(String, RgbImage)>,
}

impl MemorySink {
    pub fn stages(&self) -> Vec<&str> {
        self.images.iter().map(|(s, _)| s.as_str()).collect()
    }
}

impl DebugSink for MemorySink {
    fn emit(&mut self, stage: &str, image: &RgbImage) {
        self.images.push((stage.to_string(), image.clone()));
    }
}

/// Writes `<timestamp>-<stage>.png` files into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("mahjong_vision")
            .join("debug")
    }
}

impl DebugSink for DirectorySink {
    fn emit(&mut self, stage: &str, image: &RgbImage) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::warn!("debug dir {} unavailable: {}", self.dir.display(), e);
            return;
        }
        let name = format!("{}-{}.png", Local::now().format("%Y%m%d-%H%M%S%.3f"), stage);
        let path = self.dir.join(name);
        match image.save(&path) {
            Ok(()) => log::debug!("debug image written to {}", path.display()),
            Err(e) => log::warn!("failed to write {}: {}", path.display(), e),
        }
    }
}

/// Outline an axis-aligned box, ignoring degenerate sizes.
pub(crate) fn outline(image: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    if w > 0 && h > 0 {
        draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
    }
}

/// Draw a closed polygon through the given points.
pub(crate) fn polygon(image: &mut RgbImage, points: &[[f64; 2]], color: Rgb<u8>) {
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            image,
            (a[0] as f32, a[1] as f32),
            (b[0] as f32, b[1] as f32),
            color,
        );
    }
}
