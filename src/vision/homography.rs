//! Homography estimation: normalized DLT inside a seeded RANSAC loop.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::transform::transform_point;

#[derive(Debug, Clone)]
pub struct RansacConfig {
    pub max_iters: usize,
    /// Inlier threshold (reprojection error in pixels).
    pub inlier_threshold: f64,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 5.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub h: Matrix3<f64>,
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
}

pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = transform_point(*src, h);
    let err = ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt();
    if err.is_finite() { err } else { f64::INFINITY }
}

/// Translate the centroid to the origin and scale the mean distance to √2.
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, normalized)
}

/// Direct linear transform from at least four correspondences.
pub fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Matrix3<f64>> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = src_n[i];
        let [dx, dy] = dst_n[i];

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of AᵀA with the smallest eigenvalue.
    let eig = SymmetricEigen::new(a.transpose() * &a);
    let min_idx = (0..9).min_by(|&i, &j| {
        eig.eigenvalues[i]
            .abs()
            .total_cmp(&eig.eigenvalues[j].abs())
    })?;
    let v = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

    let h = t_dst.try_inverse()? * h_norm * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-15 {
        return None;
    }
    let h = h / scale;
    h.iter().all(|x| x.is_finite()).then_some(h)
}

fn inliers(h: &Matrix3<f64>, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(h, s, d) < threshold)
        .collect();
    let count = mask.iter().filter(|&&m| m).count();
    (mask, count)
}

fn masked(points: &[[f64; 2]], mask: &[bool]) -> Vec<[f64; 2]> {
    points
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m)
        .map(|(p, _)| *p)
        .collect()
}

/// Robust homography `src -> dst`. Returns `None` when no 4-point sample
/// produced a usable model.
pub fn fit_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacConfig,
) -> Option<HomographyFit> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best: Option<(Matrix3<f64>, Vec<bool>, usize)> = None;
    for _ in 0..config.max_iters {
        let sample = rand::seq::index::sample(&mut rng, n, 4);
        let s4: Vec<[f64; 2]> = sample.iter().map(|i| src[i]).collect();
        let d4: Vec<[f64; 2]> = sample.iter().map(|i| dst[i]).collect();
        let Some(h) = estimate_dlt(&s4, &d4) else {
            continue;
        };
        let (mask, count) = inliers(&h, src, dst, config.inlier_threshold);
        if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
            best = Some((h, mask, count));
            // Early exit if >90% inliers
            if count * 10 > n * 9 {
                break;
            }
        }
    }

    let (mut h, mut mask, mut count) = best?;
    if count < 4 {
        return None;
    }

    // Two refits on the consensus set, re-selecting inliers in between.
    for _ in 0..2 {
        let Some(refit) = estimate_dlt(&masked(src, &mask), &masked(dst, &mask)) else {
            break;
        };
        let (refit_mask, refit_count) = inliers(&refit, src, dst, config.inlier_threshold);
        if refit_count < count {
            break;
        }
        h = refit;
        mask = refit_mask;
        count = refit_count;
    }

    Some(HomographyFit {
        h,
        inlier_mask: mask,
        n_inliers: count,
    })
}
