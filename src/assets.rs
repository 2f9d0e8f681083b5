//! Template assets: the menu reference and the action button images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::layout::REFERENCE_SIZE;

/// In-game action buttons, each matched from its own transparent template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Chii,
    Pon,
    Kan,
    Ron,
    Tsumo,
    Pass,
    Liqi,
    Ryuukyoku,
    Nuku,
}

impl Button {
    pub const ALL: [Button; 9] = [
        Button::Chii,
        Button::Pon,
        Button::Kan,
        Button::Ron,
        Button::Tsumo,
        Button::Pass,
        Button::Liqi,
        Button::Ryuukyoku,
        Button::Nuku,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Button::Chii => "chii.png",
            Button::Pon => "pon.png",
            Button::Kan => "kan.png",
            Button::Ron => "ron.png",
            Button::Tsumo => "tsumo.png",
            Button::Pass => "pass.png",
            Button::Liqi => "liqi.png",
            Button::Ryuukyoku => "ryuukyoku.png",
            Button::Nuku => "nuku.png",
        }
    }
}

pub const MENU_FILE: &str = "menu.png";

/// All templates, loaded once. Read-only afterwards.
#[derive(Debug, Clone)]
pub struct Templates {
    menu: RgbImage,
    buttons: HashMap<Button, RgbaImage>,
}

impl Templates {
    /// Load `menu.png` and every button template from `dir`.
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        let menu = open(&dir.join(MENU_FILE))?.to_rgb8();
        let mut buttons = HashMap::new();
        for button in Button::ALL {
            let path = dir.join(button.file_name());
            let img = open(&path)?;
            if !img.color().has_alpha() {
                return Err(AssetError::NoAlpha { path });
            }
            buttons.insert(button, img.to_rgba8());
        }
        log::info!("loaded {} button templates from {}", buttons.len(), dir.display());
        Self::from_images(menu, buttons)
    }

    /// Build from in-memory images. Buttons missing from the map fail the
    /// same way a missing file does.
    pub fn from_images(
        menu: RgbImage,
        buttons: HashMap<Button, RgbaImage>,
    ) -> Result<Self, AssetError> {
        if menu.dimensions() != REFERENCE_SIZE {
            return Err(AssetError::MenuSize {
                expected: REFERENCE_SIZE,
                actual: menu.dimensions(),
            });
        }
        if let Some(missing) = Button::ALL.iter().find(|b| !buttons.contains_key(*b)) {
            return Err(AssetError::Missing {
                path: PathBuf::from(missing.file_name()),
            });
        }
        Ok(Self { menu, buttons })
    }

    pub fn menu(&self) -> &RgbImage {
        &self.menu
    }

    pub fn button(&self, button: Button) -> &RgbaImage {
        // Presence of every button is checked on construction.
        &self.buttons[&button]
    }
}

fn open(path: &Path) -> Result<DynamicImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::Missing {
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
