//! Pixel-only automation core for a mahjong game client.
//!
//! Everything is derived from screen captures: a homography calibrates the
//! live window against a 1920x1080 reference layout, flood fill segments the
//! tiles, masked template matching finds the action buttons, and a pointer
//! driver clicks the results.

pub mod assets;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod debug;
pub mod error;
pub mod input;
pub mod layout;
pub mod session;
pub mod vision;

pub use assets::{Button, Templates};
pub use capture::{MonitorCapture, ScreenSource};
pub use classifier::{Tile, TileClassifier};
pub use config::Config;
pub use error::{AssetError, ConfigError, VisionError};
pub use input::{EnigoDriver, InputDriver};
pub use layout::{Mode, Operation, Room};
pub use session::{GameWindow, MeldOutcome};
pub use vision::frame::Frame;
pub use vision::transform::{Point, Transform};
