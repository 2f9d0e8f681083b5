//! Canonical UI anchors on the 1920x1080 reference layout, and the choices a
//! caller can make in the lobby.

use serde::{Deserialize, Serialize};

pub const REFERENCE_SIZE: (u32, u32) = (1920, 1080);

/// Where the pointer rests between actions.
pub const PARK_POSITION: [f64; 2] = [100.0, 100.0];
/// "Confirm" on the end-of-game result screens.
pub const GAME_END_CONFIRM: [f64; 2] = [1785.0, 1003.0];

pub const RANKED_LOBBY: [f64; 2] = [1348.0, 321.0];
pub const MATCH_LOBBY: [f64; 2] = [1348.0, 500.0];

/// Right-hand lobby menu entries, top to bottom. Entry 4 only comes into
/// view after the list has been dragged up.
pub const MENU_BUTTONS: [[f64; 2]; 5] = [
    [1382.0, 406.0],
    [1382.0, 573.0],
    [1382.0, 740.0],
    [1383.0, 885.0],
    [1393.0, 813.0],
];

/// Ranked room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Room {
    Bronze,
    Silver,
    Gold,
    Jade,
    Throne,
}

impl Room {
    pub fn menu_index(self) -> usize {
        match self {
            Room::Bronze => 0,
            Room::Silver => 1,
            Room::Gold => 2,
            Room::Jade => 3,
            Room::Throne => 4,
        }
    }

    /// The throne room entry sits below the fold.
    pub fn needs_scroll(self) -> bool {
        self == Room::Throne
    }
}

/// Table size and game length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    EastFour,
    SouthFour,
    EastThree,
    SouthThree,
}

impl Mode {
    pub fn menu_index(self) -> usize {
        match self {
            Mode::EastFour => 0,
            Mode::SouthFour => 1,
            Mode::EastThree => 2,
            Mode::SouthThree => 3,
        }
    }
}

/// Decision handed down by the game logic in response to a call
/// opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    NoEffect,
    Discard,
    Chi,
    Peng,
    AnGang,
    MingGang,
    JiaGang,
    Liqi,
    Zimo,
    Hu,
    JiuZhongJiuPai,
    Babei,
}
