//! # Layout Calibration
//!
//! Finds where the reference layout sits inside the live capture.
//!
//! 1. Keypoints + binary descriptors on both images.
//! 2. 2-NN matching through an LSH index, filtered by the ratio test.
//! 3. RANSAC homography from the surviving correspondences.
//! 4. Validation: the live region under the projected reference must look
//!    like the reference. A homography fitted to sparse matches can be
//!    numerically fine yet geometrically wrong; this catches it.

use image::imageops;
use image::RgbImage;

use super::features::OrbDetector;
use super::frame::crop_clamped;
use super::homography::fit_homography_ransac;
use super::matcher::ratio_matches;
use super::similarity::similarity;
use super::transform::{Point, Transform};
use crate::config::MatcherConfig;
use crate::debug::{self, DebugSink};
use crate::error::VisionError;

/// A validated reference-to-live transform plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub transform: Transform,
    /// Ratio-test survivors.
    pub matches: usize,
    pub inliers: usize,
    /// Similarity between the reference and the projected live region.
    pub similarity: f64,
}

pub struct Calibrator {
    config: MatcherConfig,
    detector: OrbDetector,
}

impl Calibrator {
    pub fn new(config: MatcherConfig) -> Self {
        let detector = OrbDetector::new(config.feature_count);
        Self { config, detector }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Estimate and validate the transform mapping `reference` into `live`.
    ///
    /// Returns `NotFound` when too few matches survive the ratio test, when
    /// no homography can be fitted, or when the projected region's
    /// similarity does not exceed `threshold`.
    pub fn calibrate(
        &self,
        reference: &RgbImage,
        live: &RgbImage,
        threshold: f64,
        debug: &mut dyn DebugSink,
    ) -> Result<Calibration, VisionError> {
        let ref_features = self.detector.detect_and_compute(&imageops::grayscale(reference));
        let live_features = self.detector.detect_and_compute(&imageops::grayscale(live));

        let good = ratio_matches(
            &ref_features.descriptors,
            &live_features.descriptors,
            self.config.ratio,
        );
        log::info!("  Number of good matches: {}", good.len());
        if good.len() < self.config.min_matches {
            log::info!(
                "Not enough matches are found - {}/{}",
                good.len(),
                self.config.min_matches
            );
            return Err(VisionError::not_found("calibration"));
        }

        let src: Vec<[f64; 2]> = good
            .iter()
            .map(|m| {
                let kp = &ref_features.keypoints[m.query];
                [kp.x, kp.y]
            })
            .collect();
        let dst: Vec<[f64; 2]> = good
            .iter()
            .map(|m| {
                let kp = &live_features.keypoints[m.train];
                [kp.x, kp.y]
            })
            .collect();

        let Some(fit) = fit_homography_ransac(&src, &dst, &self.config.ransac()) else {
            log::info!("homography estimation failed");
            return Err(VisionError::not_found("calibration"));
        };
        let transform = Transform::from_matrix(fit.h);
        log::debug!(
            "  Homography Matrix: {:?} ({} inliers)",
            transform.rows(),
            fit.n_inliers
        );

        let (w, h) = (reference.width() as f64, reference.height() as f64);
        let quad: Vec<[f64; 2]> = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
            .iter()
            .map(|&c| transform.apply(c))
            .collect();

        if debug.enabled() {
            let mut vis = live.clone();
            for (i, m) in good.iter().enumerate() {
                let kp = &live_features.keypoints[m.train];
                let color = if fit.inlier_mask[i] {
                    debug::SOFT_GREEN
                } else {
                    debug::SOFT_RED
                };
                debug::outline(&mut vis, kp.x as i32 - 2, kp.y as i32 - 2, 5, 5, color);
            }
            debug::polygon(&mut vis, &quad, debug::SOFT_YELLOW);
            debug.emit("calibration", &vis);
        }

        let Some((top_left, bottom_right)) = bounding_box(&quad) else {
            return Err(VisionError::not_found("calibration"));
        };
        let Some(region) = crop_clamped(live, top_left, bottom_right) else {
            log::info!("projected reference lies outside the capture");
            return Err(VisionError::not_found("calibration"));
        };
        let s = similarity(reference, &region);
        log::info!("Similarity: {:.3}", s);
        if s > threshold {
            Ok(Calibration {
                transform,
                matches: good.len(),
                inliers: fit.n_inliers,
                similarity: s,
            })
        } else {
            Err(VisionError::not_found("calibration"))
        }
    }
}

/// Integer bounding box of a projected quadrilateral.
fn bounding_box(points: &[[f64; 2]]) -> Option<(Point, Point)> {
    if points.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return None;
    }
    let min_x = points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
    let min_y = points.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
    let max_y = points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
    Some((
        Point::new(min_x.round() as i32, min_y.round() as i32),
        Point::new(max_x.round() as i32, max_y.round() as i32),
    ))
}
