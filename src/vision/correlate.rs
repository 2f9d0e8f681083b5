//! Sliding-window sums over a whole image through the 2-D FFT.
//!
//! Correlating a `tw x th` kernel with a `w x h` plane on a `w x h` grid
//! wraps around only for positions where the kernel would leave the plane,
//! so no padding is needed for the valid positions the matcher reads.

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// FFT plans for one `width x height` grid.
pub(crate) struct Grid {
    width: usize,
    height: usize,
    rows: Arc<dyn Fft<f64>>,
    cols: Arc<dyn Fft<f64>>,
    rows_inv: Arc<dyn Fft<f64>>,
    cols_inv: Arc<dyn Fft<f64>>,
}

impl Grid {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            width,
            height,
            rows: planner.plan_fft_forward(width),
            cols: planner.plan_fft_forward(height),
            rows_inv: planner.plan_fft_inverse(width),
            cols_inv: planner.plan_fft_inverse(height),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.width * self.height
    }

    /// Spectrum of a row-major `w x h` plane placed at the grid origin.
    pub(crate) fn spectrum(&self, plane: &[f64], w: usize, h: usize) -> Vec<Complex<f64>> {
        let mut data = vec![Complex::new(0.0, 0.0); self.len()];
        for y in 0..h {
            let src = &plane[y * w..(y + 1) * w];
            for (dst, &v) in data[y * self.width..y * self.width + w].iter_mut().zip(src) {
                dst.re = v;
            }
        }
        self.transform(&mut data, false);
        data
    }

    /// Inverse transform, scaled back to plain sums.
    pub(crate) fn inverse(&self, mut spectrum: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        self.transform(&mut spectrum, true);
        let scale = 1.0 / self.len() as f64;
        for v in &mut spectrum {
            *v *= scale;
        }
        spectrum
    }

    fn transform(&self, data: &mut [Complex<f64>], inverse: bool) {
        let (rows, cols) = if inverse {
            (&self.rows_inv, &self.cols_inv)
        } else {
            (&self.rows, &self.cols)
        };
        data.par_chunks_mut(self.width).for_each(|row| rows.process(row));

        let mut columns = vec![Complex::new(0.0, 0.0); data.len()];
        transpose(data, &mut columns, self.width, self.height);
        columns.par_chunks_mut(self.height).for_each(|col| cols.process(col));
        transpose(&columns, data, self.height, self.width);
    }
}

/// `acc += weight * image * conj(kernel)`, the spectrum of the correlation
/// of `kernel` over `image`.
pub(crate) fn accumulate(
    acc: &mut [Complex<f64>],
    image: &[Complex<f64>],
    kernel: &[Complex<f64>],
    weight: Complex<f64>,
) {
    acc.par_iter_mut()
        .zip(image.par_iter().zip(kernel.par_iter()))
        .for_each(|(a, (i, k))| *a += weight * i * k.conj());
}

fn transpose(src: &[Complex<f64>], dst: &mut [Complex<f64>], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            dst[x * height + y] = src[y * width + x];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_matches_direct_sum() {
        let (w, h) = (13usize, 7usize);
        let plane: Vec<f64> = (0..w * h).map(|i| ((i * 37) % 101) as f64).collect();
        let (kw, kh) = (3usize, 2usize);
        let kernel = [1.0, 0.0, 2.0, 4.0, 1.0, 0.0];

        let grid = Grid::new(w, h);
        let mut acc = vec![Complex::new(0.0, 0.0); grid.len()];
        accumulate(
            &mut acc,
            &grid.spectrum(&plane, w, h),
            &grid.spectrum(&kernel, kw, kh),
            Complex::new(1.0, 0.0),
        );
        let out = grid.inverse(acc);

        for y in 0..=h - kh {
            for x in 0..=w - kw {
                let mut direct = 0.0;
                for dy in 0..kh {
                    for dx in 0..kw {
                        direct += kernel[dy * kw + dx] * plane[(y + dy) * w + x + dx];
                    }
                }
                let got = out[y * w + x];
                assert!((got.re - direct).abs() < 1e-6, "({x}, {y}): {} vs {}", got.re, direct);
                assert!(got.im.abs() < 1e-6);
            }
        }
    }
}
