#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Result};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mahjong_vision::config::Timings;
use mahjong_vision::{Button, Config, Frame, InputDriver, Point, ScreenSource, Templates, Tile};

pub const TABLE: Rgb<u8> = Rgb([20, 60, 40]);
pub const IVORY: Rgb<u8> = Rgb([240, 240, 230]);
pub const RED: Rgb<u8> = Rgb([230, 120, 120]);
pub const GREEN: Rgb<u8> = Rgb([120, 230, 120]);
pub const BLUE: Rgb<u8> = Rgb([120, 120, 230]);

pub fn fill_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for yy in y..(y + h).min(image.height()) {
        for xx in x..(x + w).min(image.width()) {
            image.put_pixel(xx, yy, color);
        }
    }
}

/// Random rectangles whose blue channel stays dim, so nothing in the
/// texture is bright enough to pass for a tile.
pub fn menu_image(seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_pixel(1920, 1080, Rgb([90, 90, 60]));
    for _ in 0..1500 {
        let w = rng.random_range(8..70);
        let h = rng.random_range(8..70);
        let x = rng.random_range(0..1920);
        let y = rng.random_range(0..1080);
        let color = Rgb([
            rng.random_range(0..=220),
            rng.random_range(0..=220),
            rng.random_range(0..=100),
        ]);
        fill_rect(&mut img, x, y, w, h, color);
    }
    img
}

pub fn noise(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for yy in y..y + h {
        for xx in x..x + w {
            image.put_pixel(xx, yy, Rgb([rng.random(), rng.random(), rng.random()]));
        }
    }
}

/// Tile face with a coloured mark in the middle.
pub fn draw_tile(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, face: Rgb<u8>, mark: Rgb<u8>) {
    fill_rect(image, x, y, w, h, face);
    fill_rect(image, x + w / 4, y + h / 4, w / 2, h / 2, mark);
}

/// Random button face with rounded, fully transparent corners.
pub fn button_face(w: u32, h: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let r = (h / 4) as i64;
    RgbaImage::from_fn(w, h, |x, y| {
        let cx = (x as i64).clamp(r, w as i64 - 1 - r);
        let cy = (y as i64).clamp(r, h as i64 - 1 - r);
        let (dx, dy) = (x as i64 - cx, y as i64 - cy);
        let texel = Rgba([rng.random(), rng.random(), rng.random(), 255]);
        if dx * dx + dy * dy > r * r { Rgba([0, 0, 0, 0]) } else { texel }
    })
}

pub fn paste_button(image: &mut RgbImage, button: &RgbaImage, x: u32, y: u32) {
    for (bx, by, p) in button.enumerate_pixels() {
        if p[3] > 0 {
            image.put_pixel(x + bx, y + by, Rgb([p[0], p[1], p[2]]));
        }
    }
}

pub fn templates(menu: RgbImage) -> Templates {
    let buttons: HashMap<Button, RgbaImage> = Button::ALL
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, button_face(60, 24, 100 + i as u64)))
        .collect();
    Templates::from_images(menu, buttons).unwrap()
}

/// Labels tiles by the dominant colour of their centre mark.
pub fn mark_classifier(region: &RgbImage) -> Tile {
    let p = region.get_pixel(region.width() / 2, region.height() / 2);
    let label = if p[0] > p[1] + 50 && p[0] > p[2] + 50 {
        "1m"
    } else if p[2] > p[0] + 50 && p[2] > p[1] + 50 {
        "2p"
    } else if p[1] > p[0] + 50 && p[1] > p[2] + 50 {
        "3s"
    } else {
        "?"
    };
    Tile::new(label)
}

/// Replays prepared frames; the last one repeats forever.
pub struct ScriptedScreen {
    frames: VecDeque<RgbImage>,
    pub captures: usize,
}

impl ScriptedScreen {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
            captures: 0,
        }
    }
}

impl ScreenSource for ScriptedScreen {
    fn capture(&mut self) -> Result<Frame> {
        self.captures += 1;
        let image = if self.frames.len() > 1 {
            self.frames.pop_front()
        } else {
            self.frames.front().cloned()
        };
        match image {
            Some(image) => Ok(Frame::new(image)),
            None => bail!("no frames scripted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Move(i32, i32),
    Click(i32, i32),
    Drag(i32, i32),
}

#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub events: Vec<Event>,
}

impl InputDriver for RecordingDriver {
    fn move_to(&mut self, p: Point) -> Result<()> {
        self.events.push(Event::Move(p.x, p.y));
        Ok(())
    }

    fn click(&mut self, p: Point) -> Result<()> {
        self.events.push(Event::Click(p.x, p.y));
        Ok(())
    }

    fn drag_to(&mut self, p: Point) -> Result<()> {
        self.events.push(Event::Drag(p.x, p.y));
        Ok(())
    }
}

/// Defaults with no pauses and a lighter feature budget.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.timings = Timings::immediate();
    config.matcher.feature_count = 1500;
    config
}
