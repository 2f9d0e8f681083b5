//! Canonical-to-live coordinate mapping.
//!
//! UI anchors are authored against a 1920x1080 reference layout. The live
//! window may be scaled, letterboxed or slightly skewed, so every canonical
//! coordinate goes through a 3x3 projective transform before use.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Integer screen coordinate in live-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Apply a projective transform to a single point: `M * [x, y, 1]^T`.
///
/// No validation is done on `m`; a degenerate matrix yields non-finite
/// coordinates.
pub fn transform_point(p: [f64; 2], m: &Matrix3<f64>) -> [f64; 2] {
    let v = m * Vector3::new(p[0], p[1], 1.0);
    [v[0] / v[2], v[1] / v[2]]
}

/// Validated canonical-to-live homography. Read-only once calibrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix3<f64>,
}

impl Transform {
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self::from_matrix(Matrix3::identity())
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Row-major copy of the matrix, for logging and reports.
    pub fn rows(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        transform_point(p, &self.matrix)
    }

    /// Canonical point to the nearest live pixel.
    pub fn to_screen(&self, p: [f64; 2]) -> Point {
        let [x, y] = self.apply(p);
        Point::new(x.round() as i32, y.round() as i32)
    }

    /// Live-frame displacement of a canonical vector anchored at the origin.
    /// Used to scale reference sizes (tile dimensions, gap spans).
    pub fn span(&self, v: [f64; 2]) -> [f64; 2] {
        let o = self.apply([0.0, 0.0]);
        let p = self.apply(v);
        [p[0] - o[0], p[1] - o[1]]
    }

    /// Horizontal zoom of the live window relative to a reference layout of
    /// the given size.
    pub fn scale_x(&self, reference: (u32, u32)) -> f64 {
        let (w, h) = (reference.0 as f64, reference.1 as f64);
        let x0 = self.apply([0.0, 0.0])[0];
        let x1 = self.apply([w, h])[0];
        (x1 - x0) / w
    }

    /// Whether a reference layout of the given size lands within
    /// `tolerance` pixels of where it would be unmapped.
    pub fn is_identity_like(&self, reference: (u32, u32), tolerance: f64) -> bool {
        let (w, h) = (reference.0 as f64, reference.1 as f64);
        self.corner_reprojection_error(&Transform::identity(), w, h) <= tolerance
    }

    /// Largest distance between the two transforms' images of the corners
    /// of a `width x height` rectangle.
    pub fn corner_reprojection_error(&self, other: &Transform, width: f64, height: f64) -> f64 {
        [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
            .iter()
            .map(|&c| {
                let a = self.apply(c);
                let b = other.apply(c);
                ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_keeps_points() {
        let t = Transform::identity();
        assert_eq!(t.apply([12.5, -3.0]), [12.5, -3.0]);
        assert_eq!(t.to_screen([235.0, 1002.0]), Point::new(235, 1002));
    }

    #[test]
    fn scale_and_offset() {
        let m = Matrix3::new(0.5, 0.0, 100.0, 0.0, 0.5, 40.0, 0.0, 0.0, 1.0);
        let t = Transform::from_matrix(m);
        assert_eq!(t.apply([200.0, 100.0]), [200.0, 90.0]);
        assert_eq!(t.span([95.0, 152.0]), [47.5, 76.0]);
        assert!((t.scale_x((1920, 1080)) - 0.5).abs() < 1e-12);
        assert!(!t.is_identity_like((1920, 1080), 1.0));
        assert!(Transform::identity().is_identity_like((1920, 1080), 0.0));
    }

    #[test]
    fn projective_divides_by_w() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0);
        let p = transform_point([1000.0, 500.0], &m);
        assert!((p[0] - 500.0).abs() < 1e-9);
        assert!((p[1] - 250.0).abs() < 1e-9);
    }

    #[test]
    fn corner_error_of_shift() {
        let a = Transform::identity();
        let b = Transform::from_matrix(Matrix3::new(1.0, 0.0, 3.0, 0.0, 1.0, 4.0, 0.0, 0.0, 1.0));
        assert!((a.corner_reprojection_error(&b, 1920.0, 1080.0) - 5.0).abs() < 1e-9);
    }
}
