//! # Region Similarity
//!
//! Blur-tolerant comparison of two colour images.
//!
//! ## Rules
//! - Images of different size: the larger one is downsized to the smaller
//!   one, never the other way round.
//! - Both images are box-blurred with a kernel of ~1/50th of the smaller
//!   dimension to wash out sub-pixel noise and compression artifacts.
//! - A pixel matches when all three channels differ by less than
//!   [`CHANNEL_TOLERANCE`].
//! - The score is the fraction of matching pixels, in `[0, 1]`.

use image::imageops::{self, FilterType};
use image::{Luma, Rgb, RgbImage};
use imageproc::definitions::Image;
use imageproc::filter::separable_filter;

/// Per-channel absolute difference below which two pixels agree.
pub const CHANNEL_TOLERANCE: i16 = 30;

/// Compare two images and return the near-match ratio (0.0 - 1.0).
pub fn similarity(a: &RgbImage, b: &RgbImage) -> f64 {
    if a.width() == 0 || a.height() == 0 || b.width() == 0 || b.height() == 0 {
        return 0.0;
    }

    // Decide which one is larger from content size only, so argument order
    // never changes which image gets resampled.
    let key = |img: &RgbImage| {
        (
            img.width() as u64 * img.height() as u64,
            img.width(),
            img.height(),
        )
    };
    let (large, small) = if key(a) >= key(b) { (a, b) } else { (b, a) };
    let (w, h) = small.dimensions();

    let resized;
    let large = if large.dimensions() == (w, h) {
        large
    } else {
        resized = imageops::resize(large, w, h, FilterType::Triangle);
        &resized
    };

    let ksize = (w.min(h) / 50).max(1);
    let large = box_blur(large, ksize);
    let small = box_blur(small, ksize);

    let matching = large
        .pixels()
        .zip(small.pixels())
        .filter(|(p, q)| pixels_agree(p, q))
        .count();

    matching as f64 / (w as f64 * h as f64)
}

fn pixels_agree(p: &Rgb<u8>, q: &Rgb<u8>) -> bool {
    (0..3).all(|c| (p[c] as i16 - q[c] as i16).abs() < CHANNEL_TOLERANCE)
}

/// Normalized box blur with a `ksize x ksize` kernel, applied per channel.
///
/// An even kernel covers `ksize / 2` pixels before the centre and one fewer
/// after it. Edges repeat the border pixel.
pub(crate) fn box_blur(image: &RgbImage, ksize: u32) -> RgbImage {
    if ksize <= 1 {
        return image.clone();
    }
    let kernel = vec![1.0f32 / ksize as f32; ksize as usize];
    let channels: Vec<Image<Luma<f32>>> = (0..3)
        .map(|c| {
            let plane = Image::<Luma<f32>>::from_fn(image.width(), image.height(), |x, y| {
                Luma([image.get_pixel(x, y)[c] as f32])
            });
            separable_filter(&plane, &kernel, &kernel)
        })
        .collect();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let at = |c: usize| channels[c].get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8;
        Rgb([at(0), at(1), at(2)])
    })
}
