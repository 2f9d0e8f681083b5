//! Tile classifier collaborator.
//!
//! The classifier itself (a trained model) lives outside this crate; the
//! vision core only needs a deterministic `region image -> label` mapping.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Discrete tile label as produced by the classifier, e.g. `"5m"` or `"7z"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile(String);

impl Tile {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tile {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Maps a cropped tile region to its label. Must be free of side effects.
pub trait TileClassifier {
    fn classify(&self, region: &RgbImage) -> Tile;
}

impl<F> TileClassifier for F
where
    F: Fn(&RgbImage) -> Tile,
{
    fn classify(&self, region: &RgbImage) -> Tile {
        self(region)
    }
}
