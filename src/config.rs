//! # Configuration
//!
//! Every tunable of the vision core, with defaults matching the reference
//! 1920x1080 layout of the game client. Loaded from JSON; any field left out
//! of the file keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::vision::homography::RansacConfig;
use crate::vision::segment::ScanParams;
use crate::vision::transform::Transform;

/// Feature matching and calibration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum number of keypoints kept per image.
    pub feature_count: usize,
    /// Ratio-test threshold: best distance must be below `ratio * second`.
    pub ratio: f32,
    /// Minimum number of ratio-test survivors before a homography is tried.
    pub min_matches: usize,
    /// RANSAC inlier threshold in pixels.
    pub ransac_threshold: f64,
    pub ransac_iterations: usize,
    pub ransac_seed: u64,
    /// Whole-image similarity the projected reference must exceed.
    pub similarity_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            feature_count: 5000,
            ratio: 0.7,
            min_matches: 50,
            ransac_threshold: 5.0,
            ransac_iterations: 2000,
            ransac_seed: 0,
            similarity_threshold: 0.7,
        }
    }
}

impl MatcherConfig {
    pub fn ransac(&self) -> RansacConfig {
        RansacConfig {
            max_iters: self.ransac_iterations,
            inlier_threshold: self.ransac_threshold,
            seed: self.ransac_seed,
        }
    }
}

/// Canonical-frame description of one tile row scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan origin.
    pub start: [f64; 2],
    /// A pixel seeds a region when every channel exceeds this value.
    pub color_floor: u8,
    /// Expected tile size.
    pub tile_size: [f64; 2],
    /// Horizontal run without a region after which the scan gives up.
    pub gap_span: f64,
    /// Fraction of `tile_size` a region must exceed to count as a tile.
    pub min_size_ratio: f64,
}

impl ScanConfig {
    /// The player's own hand along the bottom of the table.
    pub fn hand() -> Self {
        Self {
            start: [235.0, 1002.0],
            color_floor: 110,
            tile_size: [95.0, 152.0],
            gap_span: 100.0,
            min_size_ratio: 0.7,
        }
    }

    /// The chi/pon candidate pairs that pop up above the hand.
    pub fn meld() -> Self {
        Self {
            start: [960.0, 753.0],
            color_floor: 200,
            tile_size: [78.0, 106.0],
            gap_span: 60.0,
            min_size_ratio: 0.7,
        }
    }

    /// Live-frame scan parameters under the given transform.
    pub fn params(&self, transform: &Transform) -> ScanParams {
        let size = transform.span(self.tile_size);
        let gap = transform.span([self.gap_span, 0.0]);
        ScanParams {
            start: transform.to_screen(self.start),
            color_floor: self.color_floor,
            min_size: (
                (size[0] * self.min_size_ratio).max(0.0) as u32,
                (size[1] * self.min_size_ratio).max(0.0) as u32,
            ),
            max_gap: gap[0].max(1.0) as u32,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::hand()
    }
}

/// Fields of a [`ScanConfig`] given in a config file. Whatever is left out
/// keeps the value of the row it overrides.
#[derive(Debug, Deserialize)]
struct ScanOverrides {
    start: Option<[f64; 2]>,
    color_floor: Option<u8>,
    tile_size: Option<[f64; 2]>,
    gap_span: Option<f64>,
    min_size_ratio: Option<f64>,
}

impl ScanOverrides {
    fn apply(self, base: ScanConfig) -> ScanConfig {
        ScanConfig {
            start: self.start.unwrap_or(base.start),
            color_floor: self.color_floor.unwrap_or(base.color_floor),
            tile_size: self.tile_size.unwrap_or(base.tile_size),
            gap_span: self.gap_span.unwrap_or(base.gap_span),
            min_size_ratio: self.min_size_ratio.unwrap_or(base.min_size_ratio),
        }
    }
}

fn meld_scan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScanConfig, D::Error> {
    ScanOverrides::deserialize(deserializer).map(|o| o.apply(ScanConfig::meld()))
}

/// Button template matching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Canonical search rectangle for action buttons.
    pub search_top_left: [f64; 2],
    pub search_bottom_right: [f64; 2],
    /// Button width on a 1080p client.
    pub button_span_live: f64,
    /// Button width in the template images.
    pub button_span_template: f64,
    /// Subtracted from the alpha mask before matching.
    pub mask_darken: u8,
    /// SQDIFF locations within this distance of the minimum are candidates.
    pub sqdiff_tolerance: f64,
    /// Width of each CCORR_NORMED retry band.
    pub ccorr_band: f64,
    pub retry_limit: u32,
    /// Masked similarity a consensus must reach whatever threshold the
    /// caller asks for. Unrelated background scores near zero.
    pub min_similarity: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            search_top_left: [595.0, 557.0],
            search_bottom_right: [1508.0, 912.0],
            button_span_live: 268.0,
            button_span_template: 220.0,
            mask_darken: 14,
            sqdiff_tolerance: 20000.0,
            ccorr_band: 0.01,
            retry_limit: 10,
            min_similarity: 0.2,
        }
    }
}

/// Settling pauses around input, in milliseconds. They give the client's
/// transition animations time to finish before the next capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Between the two captures combined for hand segmentation.
    pub frame_gap: u64,
    /// Hovering over a tile before clicking it.
    pub hover: u64,
    pub after_discard: u64,
    /// Before capturing the button area, so buttons have appeared.
    pub before_button_capture: u64,
    /// Pointer travel time before a button or candidate click.
    pub click_glide: u64,
    pub after_button: u64,
    pub after_meld: u64,
    /// Between the riichi button and the discard.
    pub liqi_settle: u64,
    /// Between end-of-game menu checks.
    pub menu_poll: u64,
    /// Between lobby navigation clicks.
    pub menu_step: u64,
    pub drag_settle: u64,
    pub confirm_glide: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            frame_gap: 500,
            hover: 300,
            after_discard: 1000,
            before_button_capture: 100,
            click_glide: 200,
            after_button: 500,
            after_meld: 1000,
            liqi_settle: 500,
            menu_poll: 8000,
            menu_step: 2000,
            drag_settle: 1500,
            confirm_glide: 500,
        }
    }
}

impl Timings {
    /// No pauses at all; for replaying captured frames.
    pub fn immediate() -> Self {
        Self {
            frame_gap: 0,
            hover: 0,
            after_discard: 0,
            before_button_capture: 0,
            click_glide: 0,
            after_button: 0,
            after_meld: 0,
            liqi_settle: 0,
            menu_poll: 0,
            menu_step: 0,
            drag_settle: 0,
            confirm_glide: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matcher: MatcherConfig,
    pub hand: ScanConfig,
    #[serde(deserialize_with = "meld_scan")]
    pub meld: ScanConfig,
    pub locator: LocatorConfig,
    pub timings: Timings,
    /// Similarity above which the game is considered back on the menu.
    pub menu_similarity: f64,
    /// Directory holding `menu.png` and the button templates.
    pub asset_dir: PathBuf,
    /// Physical-to-logical pixel ratio applied before moving the pointer.
    pub pointer_scale: f64,
    /// Emit intermediate visualizations.
    pub debug: bool,
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            hand: ScanConfig::hand(),
            meld: ScanConfig::meld(),
            locator: LocatorConfig::default(),
            timings: Timings::default(),
            menu_similarity: 0.5,
            asset_dir: PathBuf::from("template"),
            pointer_scale: 1.0,
            debug: false,
            debug_dir: None,
        }
    }
}

impl Config {
    /// `<config dir>/mahjong_vision/config.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mahjong_vision").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Config::load`] but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
