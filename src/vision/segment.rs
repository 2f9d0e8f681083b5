//! # Region Segmentation
//!
//! Finds bright, variable-width objects (tiles) along a horizontal scan line.
//!
//! A pixel whose channels all exceed the colour floor seeds a fixed-range
//! flood fill; the filled area's bounding box is the region. Regions smaller
//! than the minimum size (dimmed table decorations, text) are dropped.
//!
//! ## Scan Modes
//! - **Forward**: from a known left edge to the right, skipping past each
//!   accepted region, until too many consecutive pixels fail to seed.
//! - **Outward**: from a centre point to both sides; each side stops once it
//!   is `max_gap` past the outermost region found so far.
//!
//! Filled pixels are recorded in a visited mask owned by the call, so the
//! capture is never written to and scanning it twice gives the same result.

use image::{Rgb, RgbImage};

use super::transform::Point;
use crate::classifier::{Tile, TileClassifier};
use crate::debug::{self, DebugSink};

/// Bounding box of a flood-filled region, in live pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// One past the rightmost column.
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.width / 2) as i32,
            (self.top + self.height / 2) as i32,
        )
    }
}

/// Live-frame scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub start: Point,
    pub color_floor: u8,
    /// A region must be strictly larger than this in both dimensions.
    pub min_size: (u32, u32),
    /// Forward: consecutive seedless pixels before giving up.
    /// Outward: distance past the known extent before giving up.
    pub max_gap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Forward,
    Outward,
}

/// Segment tiles along the row through `params.start`. Regions come back
/// ordered left to right.
pub fn segment_along_axis(
    image: &RgbImage,
    params: &ScanParams,
    mode: ScanMode,
    debug: &mut dyn DebugSink,
) -> Vec<Region> {
    let mut filled = Visited::new(image.width(), image.height());
    let mut regions = match mode {
        ScanMode::Forward => scan_forward(image, &mut filled, params),
        ScanMode::Outward => scan_outward(image, &mut filled, params),
    };
    regions.sort_by_key(|r| r.left);
    log::debug!("{:?} scan from {:?}: {} regions", mode, params.start, regions.len());

    if debug.enabled() {
        let mut vis = image.clone();
        for r in &regions {
            debug::outline(&mut vis, r.left as i32, r.top as i32, r.width, r.height, debug::SOFT_GREEN);
        }
        debug.emit("segment", &vis);
    }
    regions
}

/// Crop every region out of `source` and label it.
pub fn classify_regions(
    source: &RgbImage,
    regions: &[Region],
    classifier: &dyn TileClassifier,
) -> Vec<(Tile, Point)> {
    regions
        .iter()
        .map(|r| {
            let crop = image::imageops::crop_imm(source, r.left, r.top, r.width, r.height).to_image();
            (classifier.classify(&crop), r.center())
        })
        .collect()
}

/// Pixels already claimed by a fill.
struct Visited {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Visited {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    fn insert(&mut self, x: u32, y: u32) {
        self.bits[(y * self.width + x) as usize] = true;
    }
}

fn is_seed(image: &RgbImage, filled: &Visited, x: u32, y: u32, floor: u8) -> bool {
    !filled.contains(x, y) && image.get_pixel(x, y).0.iter().all(|&c| c > floor)
}

fn accepts(r: &Region, params: &ScanParams) -> bool {
    r.width > params.min_size.0 && r.height > params.min_size.1
}

fn scan_forward(image: &RgbImage, filled: &mut Visited, params: &ScanParams) -> Vec<Region> {
    let mut regions = Vec::new();
    let (w, h) = image.dimensions();
    let (sx, y) = (params.start.x as i64, params.start.y as i64);
    if y < 0 || y >= h as i64 {
        return regions;
    }
    let y = y as u32;

    let mut fail = 0u32;
    let mut i = 0i64;
    while fail < params.max_gap {
        let x = sx + i;
        if x < 0 {
            i += 1;
            fail += 1;
            continue;
        }
        if x >= w as i64 {
            break;
        }
        let x = x as u32;
        if is_seed(image, filled, x, y, params.color_floor) {
            fail = 0;
            let r = flood_fill(image, filled, x, y, params.color_floor);
            if accepts(&r, params) {
                regions.push(r);
                i = r.right() as i64 - sx;
            }
        } else {
            fail += 1;
        }
        i += 1;
    }
    regions
}

fn scan_outward(image: &RgbImage, filled: &mut Visited, params: &ScanParams) -> Vec<Region> {
    let mut regions = Vec::new();
    let (w, h) = image.dimensions();
    let (sx, y) = (params.start.x as i64, params.start.y as i64);
    if y < 0 || y >= h as i64 {
        return regions;
    }
    let y = y as u32;
    let gap = params.max_gap as i64;
    let mut left_bound = sx;
    let mut right_bound = sx;

    for step in [-1i64, 1] {
        let mut i = 0i64;
        loop {
            let x = sx + i * step;
            if step < 0 && x < left_bound - gap {
                break;
            }
            if step > 0 && x > right_bound + gap {
                break;
            }
            if x < 0 || x >= w as i64 {
                break;
            }
            let x = x as u32;
            if is_seed(image, filled, x, y, params.color_floor) {
                let r = flood_fill(image, filled, x, y, params.color_floor);
                if accepts(&r, params) {
                    regions.push(r);
                    left_bound = left_bound.min(r.left as i64);
                    right_bound = right_bound.max(r.right() as i64);
                }
            }
            i += 1;
        }
    }
    regions
}

/// Fixed-range, 4-connected flood fill from `(x, y)`.
///
/// Every connected, unvisited pixel whose channels all lie in `[floor, 255]`
/// joins the region and is marked in `filled`, so no pixel is pushed twice
/// and it can never seed again. Returns the bounding box of the region.
fn flood_fill(image: &RgbImage, filled: &mut Visited, x: u32, y: u32, floor: u8) -> Region {
    let (w, h) = (filled.width, filled.height);
    let inside = |p: &Rgb<u8>| p.0.iter().all(|&c| c >= floor);

    let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
    let mut stack = vec![(x, y)];
    filled.insert(x, y);

    while let Some((px, py)) = stack.pop() {
        min_x = min_x.min(px);
        max_x = max_x.max(px);
        min_y = min_y.min(py);
        max_y = max_y.max(py);

        let neighbours = [
            (px.wrapping_sub(1), py),
            (px + 1, py),
            (px, py.wrapping_sub(1)),
            (px, py + 1),
        ];
        for (nx, ny) in neighbours {
            if nx < w && ny < h && !filled.contains(nx, ny) && inside(image.get_pixel(nx, ny)) {
                filled.insert(nx, ny);
                stack.push((nx, ny));
            }
        }
    }

    Region {
        left: min_x,
        top: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    }
}
