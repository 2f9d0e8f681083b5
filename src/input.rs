//! Pointer input collaborator and the pauses scheduled around it.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::config::Config;
use crate::vision::transform::Point;

/// Dumb executor of pointer actions in live-frame pixels. Timing is the
/// caller's business.
pub trait InputDriver {
    fn move_to(&mut self, p: Point) -> Result<()>;
    /// Move to `p` and press-release the left button.
    fn click(&mut self, p: Point) -> Result<()>;
    /// Hold the left button from the current position to `p`.
    fn drag_to(&mut self, p: Point) -> Result<()>;
}

/// Drives the system pointer with enigo.
///
/// Captures are in physical pixels while the pointer API may expect
/// logical ones; `scale` is the physical-to-logical ratio (2.0 on a Retina
/// display).
pub struct EnigoDriver {
    enigo: Enigo,
    scale: f64,
}

impl EnigoDriver {
    pub fn new(scale: f64) -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| anyhow!("input init failed: {}", e))?;
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Ok(Self { enigo, scale })
    }

    pub fn for_config(config: &Config) -> Result<Self> {
        Self::new(config.pointer_scale)
    }

    fn logical(&self, p: Point) -> (i32, i32) {
        (
            (p.x as f64 / self.scale).round() as i32,
            (p.y as f64 / self.scale).round() as i32,
        )
    }

    fn press(&mut self, direction: Direction) -> Result<()> {
        self.enigo
            .button(Button::Left, direction)
            .map_err(|e| anyhow!("button {:?} failed: {}", direction, e))
    }
}

impl InputDriver for EnigoDriver {
    fn move_to(&mut self, p: Point) -> Result<()> {
        let (x, y) = self.logical(p);
        log::trace!("move to ({}, {})", x, y);
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| anyhow!("move to ({}, {}) failed: {}", x, y, e))
    }

    fn click(&mut self, p: Point) -> Result<()> {
        self.move_to(p)?;
        log::trace!("click at {:?}", p);
        self.press(Direction::Click)
    }

    fn drag_to(&mut self, p: Point) -> Result<()> {
        self.press(Direction::Press)?;
        let moved = self.move_to(p);
        // Never leave the button held down.
        let released = self.press(Direction::Release);
        moved.and(released)
    }
}

/// Owns every settling delay between input actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacer;

impl Pacer {
    pub fn pause(&self, ms: u64) {
        if ms > 0 {
            log::trace!("settling for {} ms", ms);
            thread::sleep(Duration::from_millis(ms));
        }
    }
}
