//! Pixel-only vision pipeline: no capture, no input, no sleeping.

pub mod calibrate;
pub(crate) mod correlate;
pub mod features;
pub mod frame;
pub mod homography;
pub mod locate;
pub mod matcher;
pub mod segment;
pub mod similarity;
pub mod transform;
