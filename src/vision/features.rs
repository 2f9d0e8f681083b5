//! Oriented FAST keypoints with rotated binary descriptors.
//!
//! A compact ORB-style detector: FAST-9 corners on a scale pyramid,
//! intensity-centroid orientation, and a 256-bit steered BRIEF descriptor
//! sampled on a Gaussian-smoothed copy of each pyramid level.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// 256-bit binary descriptor.
pub type Descriptor = [u64; 4];

const DESCRIPTOR_BITS: usize = 256;
/// Radius of the orientation patch.
const PATCH_RADIUS: i32 = 15;
/// Test-pair coordinates are drawn from `[-PATTERN_EXTENT, PATTERN_EXTENT]`.
const PATTERN_EXTENT: i32 = 12;
/// Keypoints closer than this to the level border are dropped so that both
/// the orientation patch and any rotated test pair stay inside the image.
const BORDER: u32 = 19;
const PATTERN_SEED: u64 = 0x0b5e_55ed;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Position in level-0 (full resolution) pixels.
    pub x: f64,
    pub y: f64,
    /// Orientation in radians.
    pub angle: f32,
    pub response: f32,
    pub octave: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OrbDetector {
    pub feature_count: usize,
    pub levels: u8,
    pub scale_factor: f32,
    pub fast_threshold: u8,
    pattern: Vec<(i32, i32, i32, i32)>,
}

impl OrbDetector {
    pub fn new(feature_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let pattern = (0..DESCRIPTOR_BITS)
            .map(|_| {
                (
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                )
            })
            .collect();
        Self {
            feature_count,
            levels: 8,
            scale_factor: 1.2,
            fast_threshold: 20,
            pattern,
        }
    }

    /// Detect keypoints and compute their descriptors.
    pub fn detect_and_compute(&self, image: &GrayImage) -> Features {
        let budgets = self.level_budgets();
        let pyramid = self.build_pyramid(image);

        let per_level: Vec<Vec<(Keypoint, Descriptor)>> = pyramid
            .par_iter()
            .zip(budgets.par_iter())
            .enumerate()
            .map(|(octave, ((level, scale), &budget))| {
                self.extract_level(level, octave as u8, *scale, budget)
            })
            .collect();

        let mut features = Features::default();
        for (kp, desc) in per_level.into_iter().flatten() {
            features.keypoints.push(kp);
            features.descriptors.push(desc);
        }
        log::debug!(
            "detected {} keypoints over {} levels",
            features.len(),
            pyramid.len()
        );
        features
    }

    /// Feature budget per level, shrinking geometrically with the level area
    /// the way ORB distributes it.
    fn level_budgets(&self) -> Vec<usize> {
        let inv = 1.0 / self.scale_factor as f64;
        let levels = self.levels as i32;
        let first = self.feature_count as f64 * (1.0 - inv) / (1.0 - inv.powi(levels));
        let mut budgets: Vec<usize> = (0..levels - 1)
            .map(|l| (first * inv.powi(l)).floor() as usize)
            .collect();
        let assigned: usize = budgets.iter().sum();
        budgets.push(self.feature_count.saturating_sub(assigned));
        budgets
    }

    /// Pyramid levels with the exact per-axis scale of each level back to
    /// level 0.
    fn build_pyramid(&self, image: &GrayImage) -> Vec<(GrayImage, (f64, f64))> {
        let min_side = 2 * BORDER + 1;
        let mut pyramid = Vec::with_capacity(self.levels as usize);
        for l in 0..self.levels {
            let s = self.scale_factor.powi(l as i32);
            let w = (image.width() as f32 / s).round() as u32;
            let h = (image.height() as f32 / s).round() as u32;
            if w < min_side || h < min_side {
                break;
            }
            let level = if l == 0 {
                image.clone()
            } else {
                imageops::resize(image, w, h, FilterType::Triangle)
            };
            let scale = (
                image.width() as f64 / w as f64,
                image.height() as f64 / h as f64,
            );
            pyramid.push((level, scale));
        }
        pyramid
    }

    fn extract_level(
        &self,
        level: &GrayImage,
        octave: u8,
        scale: (f64, f64),
        budget: usize,
    ) -> Vec<(Keypoint, Descriptor)> {
        if budget == 0 {
            return Vec::new();
        }
        let (w, h) = level.dimensions();
        let corners: Vec<Corner> = corners_fast9(level, self.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= BORDER && c.y >= BORDER && c.x < w - BORDER && c.y < h - BORDER)
            .collect();
        let mut corners = suppress_non_maxima(corners, w, h);
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(budget);

        let smoothed = gaussian_blur_f32(level, 2.0);
        corners
            .into_iter()
            .map(|c| {
                let angle = intensity_centroid_angle(level, c.x, c.y);
                let descriptor = self.describe(&smoothed, c.x, c.y, angle);
                let kp = Keypoint {
                    // Pixel centres, not corners, map between levels.
                    x: (c.x as f64 + 0.5) * scale.0 - 0.5,
                    y: (c.y as f64 + 0.5) * scale.1 - 0.5,
                    angle,
                    response: c.score,
                    octave,
                };
                (kp, descriptor)
            })
            .collect()
    }

    fn describe(&self, smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let sample = |dx: i32, dy: i32| -> u8 {
            let rx = (cos * dx as f32 - sin * dy as f32).round() as i32;
            let ry = (sin * dx as f32 + cos * dy as f32).round() as i32;
            smoothed.get_pixel((x as i32 + rx) as u32, (y as i32 + ry) as u32)[0]
        };
        let mut desc = [0u64; 4];
        for (bit, &(ax, ay, bx, by)) in self.pattern.iter().enumerate() {
            if sample(ax, ay) < sample(bx, by) {
                desc[bit / 64] |= 1 << (bit % 64);
            }
        }
        desc
    }
}

/// Keep corners whose FAST score is not beaten by any 8-neighbour.
fn suppress_non_maxima(corners: Vec<Corner>, width: u32, height: u32) -> Vec<Corner> {
    let mut scores = vec![0f32; width as usize * height as usize];
    for c in &corners {
        scores[c.y as usize * width as usize + c.x as usize] = c.score;
    }
    corners
        .into_iter()
        .filter(|c| {
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (c.x as i32 + dx) as usize;
                    let ny = (c.y as i32 + dy) as usize;
                    if scores[ny * width as usize + nx] > c.score {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Orientation from the intensity centroid of a circular patch.
fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32) -> f32 {
    let (mut m01, mut m10) = (0f64, 0f64);
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        let half = ((PATCH_RADIUS * PATCH_RADIUS - dy * dy) as f64).sqrt() as i32;
        for dx in -half..=half {
            let v = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10) as f32
}

/// Number of differing bits between two descriptors.
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}
