//! Error taxonomy for the vision core.
//!
//! `NotFound` is the only recoverable outcome: the caller may capture again
//! and retry. Everything else signals a broken assumption or a collaborator
//! failure and should be propagated.

use std::path::PathBuf;

use thiserror::Error;

use crate::classifier::Tile;

#[derive(Debug, Error)]
pub enum VisionError {
    /// Calibration failed its similarity check, or a button could not be
    /// located within the retry budget.
    #[error("{stage}: not found")]
    NotFound { stage: &'static str },

    /// An operation needs the canonical-to-live transform but no calibration
    /// has succeeded yet.
    #[error("layout is not calibrated")]
    NotCalibrated,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("tile {requested} not in hand {observed:?}")]
    TileNotFound {
        requested: Tile,
        observed: Vec<Tile>,
    },

    #[error("combination {requested:?} not among candidates {observed:?}")]
    CombinationNotFound {
        requested: (Tile, Tile),
        observed: Vec<Tile>,
    },

    #[error("screen capture failed: {0:#}")]
    Capture(anyhow::Error),

    #[error("input driver failed: {0:#}")]
    Input(anyhow::Error),
}

impl VisionError {
    pub(crate) fn not_found(stage: &'static str) -> Self {
        VisionError::NotFound { stage }
    }

    /// Whether a fresh capture and retry may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VisionError::NotFound { .. })
    }
}

/// Template assets are loaded once at startup; any failure here is fatal.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset {path} not found")]
    Missing { path: PathBuf },

    #[error("asset {path} could not be decoded")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("button template {path} has no alpha channel")]
    NoAlpha { path: PathBuf },

    #[error("menu reference must be {expected:?}, got {actual:?}")]
    MenuSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
