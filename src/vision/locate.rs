//! # Template Locator
//!
//! Finds a small, partly transparent button inside a busy, animated search
//! region.
//!
//! ## Metrics
//! Two masked match surfaces are computed from the same FFT correlations:
//! - **SQDIFF** (sum of squared differences, best = minimum). Robust against
//!   flat grey areas but blurry in where it peaks.
//! - **CCORR_NORMED** (normalized cross-correlation, best = maximum). Peaks
//!   sharply but also fires on medium-grey backgrounds.
//!
//! ## Consensus
//! Every SQDIFF location within `sqdiff_tolerance` of the minimum is a
//! candidate. CCORR is then searched in bands of width `ccorr_band` below its
//! maximum, one band per retry. The first CCORR location (row-major) whose
//! box overlaps a candidate box wins. No overlap within `retry_limit` bands
//! means the button is not there.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use rustfft::num_complex::Complex;

use super::correlate::{accumulate, Grid};
use super::similarity::similarity;
use super::transform::Point;
use crate::config::LocatorConfig;
use crate::debug::{self, DebugSink};
use crate::error::VisionError;

/// A button template scaled for the live frame.
#[derive(Debug, Clone)]
pub struct PreparedTemplate {
    pub color: RgbImage,
    /// Binary match mask: 255 where the darkened alpha is still non-zero.
    pub mask: GrayImage,
    /// Resized alpha before darkening; 0 marks fully transparent pixels.
    pub alpha: GrayImage,
}

impl PreparedTemplate {
    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }

    /// Copy of the colour layer with transparent pixels zeroed.
    fn masked_color(&self) -> RgbImage {
        let mut out = self.color.clone();
        zero_transparent(&mut out, &self.alpha);
        out
    }
}

/// Resize `template` by `zoom` and derive its match mask.
///
/// The alpha channel is darkened by `darken` before binarization so that the
/// soft, over-weighted edges left by resampling stop taking part in matching.
pub fn prepare_template(template: &RgbaImage, zoom: f64, darken: u8) -> PreparedTemplate {
    let w = ((template.width() as f64 * zoom).round() as u32).max(1);
    let h = ((template.height() as f64 * zoom).round() as u32).max(1);
    let resized = if (w, h) == template.dimensions() {
        template.clone()
    } else {
        imageops::resize(template, w, h, FilterType::Triangle)
    };

    let color = RgbImage::from_fn(w, h, |x, y| {
        let p = resized.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });
    let alpha = GrayImage::from_fn(w, h, |x, y| Luma([resized.get_pixel(x, y)[3]]));
    let mask = GrayImage::from_fn(w, h, |x, y| {
        let a = alpha.get_pixel(x, y)[0].saturating_sub(darken);
        Luma([if a > 0 { 255 } else { 0 }])
    });
    PreparedTemplate { color, mask, alpha }
}

/// Both match surfaces over every valid template position, row-major.
#[derive(Debug, Clone)]
pub struct MatchSurfaces {
    pub width: u32,
    pub height: u32,
    pub sqdiff: Vec<f64>,
    pub ccorr: Vec<f64>,
}

impl MatchSurfaces {
    /// Masked SQDIFF and CCORR_NORMED of `template` slid over `region`.
    /// `None` when the template does not fit.
    ///
    /// With a binary mask `M`, template `T` and image `I`, both metrics
    /// expand into three sums per position: the constant `ΣM·T²`, the cross
    /// term `Σ(M·T)·I` and the window energy `ΣM·I²`. The two position
    /// dependent sums are correlations and come out of one inverse FFT, the
    /// cross term in the real part and the energy in the imaginary part.
    pub fn compute(region: &RgbImage, template: &PreparedTemplate) -> Option<Self> {
        let (rw, rh) = region.dimensions();
        let (tw, th) = (template.width(), template.height());
        if tw > rw || th > rh {
            return None;
        }
        let width = rw - tw + 1;
        let height = rh - th + 1;

        let n = (rw * rh) as usize;
        let mut channels = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
        let mut squares = vec![0.0; n];
        for (i, p) in region.pixels().enumerate() {
            for c in 0..3 {
                let v = p[c] as f64;
                channels[c][i] = v;
                squares[i] += v * v;
            }
        }

        let tn = (tw * th) as usize;
        let mut weighted = [vec![0.0; tn], vec![0.0; tn], vec![0.0; tn]];
        let mut mask = vec![0.0; tn];
        let mut templ_energy = 0.0;
        for (i, (p, m)) in template.color.pixels().zip(template.mask.pixels()).enumerate() {
            if m[0] == 0 {
                continue;
            }
            mask[i] = 1.0;
            for c in 0..3 {
                let v = p[c] as f64;
                weighted[c][i] = v;
                templ_energy += v * v;
            }
        }

        let (rw, rh, tw, th) = (rw as usize, rh as usize, tw as usize, th as usize);
        let grid = Grid::new(rw, rh);
        let mut product = vec![Complex::new(0.0, 0.0); grid.len()];
        for c in 0..3 {
            accumulate(
                &mut product,
                &grid.spectrum(&channels[c], rw, rh),
                &grid.spectrum(&weighted[c], tw, th),
                Complex::new(1.0, 0.0),
            );
        }
        accumulate(
            &mut product,
            &grid.spectrum(&squares, rw, rh),
            &grid.spectrum(&mask, tw, th),
            Complex::new(0.0, 1.0),
        );
        let sums = grid.inverse(product);

        let (mut sqdiff, mut ccorr) = (Vec::with_capacity(n), Vec::with_capacity(n));
        for y in 0..height as usize {
            for x in 0..width as usize {
                // Exact sums are integers; rounding drops the FFT error.
                let v = sums[y * rw + x];
                let cross = v.re.round();
                let energy = v.im.round().max(0.0);
                sqdiff.push((templ_energy - 2.0 * cross + energy).max(0.0));
                let denom = (templ_energy * energy).sqrt();
                ccorr.push(if denom > f64::EPSILON { cross / denom } else { 0.0 });
            }
        }

        Some(Self {
            width,
            height,
            sqdiff,
            ccorr,
        })
    }

    fn location(&self, index: usize) -> (u32, u32) {
        (index as u32 % self.width, index as u32 / self.width)
    }

    pub fn min_sqdiff(&self) -> f64 {
        self.sqdiff.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_ccorr(&self) -> f64 {
        self.ccorr.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Where the consensus search settled.
#[derive(Debug, Clone)]
struct Consensus {
    location: (u32, u32),
    candidates: Vec<(u32, u32)>,
    /// Band locations examined before the winner, winner included.
    examined: Vec<(u32, u32)>,
}

fn overlaps(a: (u32, u32), b: (u32, u32), size: (u32, u32)) -> bool {
    a.0.abs_diff(b.0) < size.0 && a.1.abs_diff(b.1) < size.1
}

fn find_consensus(
    surfaces: &MatchSurfaces,
    size: (u32, u32),
    config: &LocatorConfig,
) -> Result<Consensus, Vec<(u32, u32)>> {
    let min_sq = surfaces.min_sqdiff();
    let max_cc = surfaces.max_ccorr();
    log::debug!("sqdiff min {:.0}, ccorr max {:.4}", min_sq, max_cc);

    let candidates: Vec<(u32, u32)> = surfaces
        .sqdiff
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < min_sq + config.sqdiff_tolerance)
        .map(|(i, _)| surfaces.location(i))
        .collect();

    let mut examined = Vec::new();
    for retry in 1..=config.retry_limit {
        let lower = max_cc - config.ccorr_band * retry as f64;
        let upper = max_cc - config.ccorr_band * (retry - 1) as f64;
        log::debug!("ccorr band {}: ({:.4}, {:.4}]", retry, lower, upper);
        for (i, v) in surfaces.ccorr.iter().enumerate() {
            if *v > lower && *v <= upper {
                let pt = surfaces.location(i);
                examined.push(pt);
                if candidates.iter().any(|&c| overlaps(c, pt, size)) {
                    return Ok(Consensus {
                        location: pt,
                        candidates,
                        examined,
                    });
                }
            }
        }
    }
    Err(candidates)
}

/// A resolved button position inside the search region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub top_left: Point,
    pub width: u32,
    pub height: u32,
    /// Masked similarity between template and the located crop.
    pub similarity: f64,
}

impl Located {
    pub fn center(&self) -> Point {
        self.top_left
            .offset((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

/// Locate `template` (scaled by `zoom`) inside `region`.
///
/// The returned coordinates are relative to `region`. `NotFound` when the
/// template does not fit, when no consensus emerges within the retry budget,
/// or when the masked similarity falls short of `accept_threshold` or of the
/// configured `min_similarity`, whichever is higher. The consensus always
/// lands somewhere, so the floor is what turns an absent button into
/// `NotFound` at a zero threshold.
pub fn locate_button(
    template: &RgbaImage,
    region: &RgbImage,
    zoom: f64,
    accept_threshold: f64,
    config: &LocatorConfig,
    debug: &mut dyn DebugSink,
) -> Result<Located, VisionError> {
    let prepared = prepare_template(template, zoom, config.mask_darken);
    let size = (prepared.width(), prepared.height());
    let Some(surfaces) = MatchSurfaces::compute(region, &prepared) else {
        log::debug!("template {:?} larger than search region {:?}", size, region.dimensions());
        return Err(VisionError::not_found("button"));
    };

    let consensus = find_consensus(&surfaces, size, config);
    if debug.enabled() {
        let mut vis = region.clone();
        let (candidates, examined, chosen) = match &consensus {
            Ok(c) => (&c.candidates, c.examined.as_slice(), Some(c.location)),
            Err(candidates) => (candidates, &[][..], None),
        };
        for &(x, y) in candidates {
            debug::outline(&mut vis, x as i32, y as i32, size.0, size.1, debug::SOFT_RED);
        }
        for &(x, y) in examined {
            debug::outline(&mut vis, x as i32, y as i32, size.0, size.1, debug::SOFT_GREEN);
        }
        if let Some((x, y)) = chosen {
            debug::outline(&mut vis, x as i32, y as i32, size.0, size.1, debug::SOFT_YELLOW);
        }
        debug.emit("locate", &vis);
    }

    let Ok(consensus) = consensus else {
        log::debug!("no consensus within {} bands", config.retry_limit);
        return Err(VisionError::not_found("button"));
    };
    let (x, y) = consensus.location;

    let mut crop = imageops::crop_imm(region, x, y, size.0, size.1).to_image();
    zero_transparent(&mut crop, &prepared.alpha);
    let score = similarity(&prepared.masked_color(), &crop);
    log::debug!("button at ({}, {}), masked similarity {:.3}", x, y, score);

    if score >= accept_threshold.max(config.min_similarity) {
        Ok(Located {
            top_left: Point::new(x as i32, y as i32),
            width: size.0,
            height: size.1,
            similarity: score,
        })
    } else {
        Err(VisionError::not_found("button"))
    }
}

fn zero_transparent(image: &mut RgbImage, alpha: &GrayImage) {
    for (p, a) in image.pixels_mut().zip(alpha.pixels()) {
        if a[0] == 0 {
            *p = Rgb([0, 0, 0]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::{MemorySink, NullSink};
    use crate::vision::test_support::{button_template, noise_image, paste_opaque};

    #[test]
    fn finds_exact_copy_in_noise() {
        let template = button_template(48, 24);
        let mut region = noise_image(220, 130, 11);
        paste_opaque(&mut region, &template, 70, 45);

        let mut sink = MemorySink::default();
        let found = locate_button(&template, &region, 1.0, 0.0, &LocatorConfig::default(), &mut sink).unwrap();
        assert!(found.top_left.x.abs_diff(70) <= 2 && found.top_left.y.abs_diff(45) <= 2);
        assert_eq!(found.center(), found.top_left.offset(24, 12));
        assert!(found.similarity > 0.9);
        assert_eq!(sink.stages(), vec!["locate"]);
    }

    #[test]
    fn noise_only_fails_threshold() {
        let template = button_template(48, 24);
        let region = noise_image(220, 130, 12);
        let result = locate_button(&template, &region, 1.0, 0.7, &LocatorConfig::default(), &mut NullSink);
        assert!(matches!(result, Err(VisionError::NotFound { .. })));
    }

    #[test]
    fn noise_only_is_not_found_at_zero_threshold() {
        let template = button_template(48, 24);
        for seed in 0..10 {
            let region = noise_image(220, 130, seed);
            let result = locate_button(&template, &region, 1.0, 0.0, &LocatorConfig::default(), &mut NullSink);
            assert!(matches!(result, Err(VisionError::NotFound { .. })), "seed {seed}: {result:?}");
        }
    }

    #[test]
    fn surfaces_match_direct_masked_sums() {
        let template = button_template(9, 6);
        let prepared = prepare_template(&template, 1.0, 14);
        let region = noise_image(31, 17, 5);
        let surfaces = MatchSurfaces::compute(&region, &prepared).unwrap();
        assert_eq!((surfaces.width, surfaces.height), (23, 12));

        for y in 0..surfaces.height {
            for x in 0..surfaces.width {
                let (mut sq, mut cross, mut energy, mut templ) = (0.0, 0.0, 0.0, 0.0);
                for (dx, dy, m) in prepared.mask.enumerate_pixels() {
                    if m[0] == 0 {
                        continue;
                    }
                    let t = prepared.color.get_pixel(dx, dy);
                    let p = region.get_pixel(x + dx, y + dy);
                    for c in 0..3 {
                        let (t, v) = (t[c] as f64, p[c] as f64);
                        sq += (t - v) * (t - v);
                        cross += t * v;
                        energy += v * v;
                        templ += t * t;
                    }
                }
                let i = (y * surfaces.width + x) as usize;
                assert_eq!(surfaces.sqdiff[i], sq, "sqdiff at ({x}, {y})");
                let cc = cross / (templ * energy).sqrt();
                assert!((surfaces.ccorr[i] - cc).abs() < 1e-9, "ccorr at ({x}, {y})");
            }
        }
    }

    #[test]
    fn full_size_search_is_fast() {
        let template = button_template(220, 80);
        let zoom = 268.0 / 220.0;
        let prepared = prepare_template(&template, zoom, 0);
        let scaled = imageops::resize(&template, prepared.width(), prepared.height(), FilterType::Triangle);
        let mut region = noise_image(913, 355, 3);
        paste_opaque(&mut region, &scaled, 400, 150);

        let started = std::time::Instant::now();
        let found = locate_button(&template, &region, zoom, 0.0, &LocatorConfig::default(), &mut NullSink).unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
        assert!(found.top_left.x.abs_diff(400) <= 2 && found.top_left.y.abs_diff(150) <= 2);
    }

    #[test]
    fn template_larger_than_region() {
        let template = button_template(48, 24);
        let region = noise_image(40, 20, 1);
        let result = locate_button(&template, &region, 1.0, 0.0, &LocatorConfig::default(), &mut NullSink);
        assert!(matches!(result, Err(VisionError::NotFound { .. })));
    }

    #[test]
    fn prepare_scales_and_darkens() {
        let mut template = button_template(220, 80);
        // Faint edge pixel that darkening must remove from the mask.
        template.get_pixel_mut(110, 40)[3] = 10;
        let p = prepare_template(&template, 1.0, 14);
        assert_eq!(p.mask.get_pixel(110, 40)[0], 0);
        assert_eq!(p.alpha.get_pixel(110, 40)[0], 10);
        assert_eq!(p.mask.get_pixel(100, 40)[0], 255);

        let zoomed = prepare_template(&template, 268.0 / 220.0, 14);
        assert_eq!((zoomed.width(), zoomed.height()), (268, 97));
    }

    #[test]
    fn consensus_walks_down_bands() {
        // 10x10 surface, template 3x3. SQDIFF favours (7, 7); CCORR peaks
        // far away at (1, 1) and only its second band reaches (6, 7).
        let (w, h) = (10u32, 10u32);
        let mut sqdiff = vec![1e6; (w * h) as usize];
        let mut ccorr = vec![0.5; (w * h) as usize];
        sqdiff[(7 * w + 7) as usize] = 0.0;
        ccorr[(w + 1) as usize] = 0.99;
        ccorr[(7 * w + 6) as usize] = 0.975;
        let surfaces = MatchSurfaces { width: w, height: h, sqdiff, ccorr };

        let found = find_consensus(&surfaces, (3, 3), &LocatorConfig::default()).unwrap();
        assert_eq!(found.location, (6, 7));
        assert_eq!(found.candidates, vec![(7, 7)]);
        assert_eq!(found.examined, vec![(1, 1), (6, 7)]);
    }

    #[test]
    fn consensus_gives_up_after_retry_limit() {
        let (w, h) = (10u32, 10u32);
        let mut sqdiff = vec![1e6; (w * h) as usize];
        let mut ccorr = vec![0.0; (w * h) as usize];
        sqdiff[(8 * w + 8) as usize] = 0.0;
        ccorr[0] = 0.9;
        let surfaces = MatchSurfaces { width: w, height: h, sqdiff, ccorr };
        let config = LocatorConfig { retry_limit: 3, ..LocatorConfig::default() };
        assert!(find_consensus(&surfaces, (3, 3), &config).is_err());
    }

    #[test]
    fn overlap_is_strict() {
        assert!(overlaps((0, 0), (2, 2), (3, 3)));
        assert!(!overlaps((0, 0), (3, 0), (3, 3)));
        assert!(overlaps((5, 5), (3, 4), (3, 3)));
    }
}
