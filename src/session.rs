//! # Game Window Session
//!
//! Glue between the pixel pipeline and the outside world. A [`GameWindow`]
//! owns the capture source, the input driver, the classifier and the
//! templates, remembers the transform of the last successful calibration and
//! turns decisions ("discard 5m", "press pon") into pointer input.
//!
//! Every pause between input actions is scheduled here from [`Timings`];
//! the driver itself never sleeps.

use image::{RgbImage, RgbaImage};

use crate::assets::{Button, Templates};
use crate::capture::ScreenSource;
use crate::classifier::{Tile, TileClassifier};
use crate::config::{Config, LocatorConfig, Timings};
use crate::debug::{DebugSink, DirectorySink, NullSink};
use crate::error::VisionError;
use crate::input::{InputDriver, Pacer};
use crate::layout::{
    Mode, Operation, Room, GAME_END_CONFIRM, MATCH_LOBBY, MENU_BUTTONS, PARK_POSITION,
    RANKED_LOBBY, REFERENCE_SIZE,
};
use crate::vision::calibrate::{Calibration, Calibrator};
use crate::vision::frame::{crop_clamped, Frame};
use crate::vision::locate::{locate_button, Located};
use crate::vision::segment::{classify_regions, segment_along_axis, ScanMode};
use crate::vision::similarity::similarity;
use crate::vision::transform::{Point, Transform};

/// Result of a meld candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldOutcome {
    /// The left tile of the matching pair was clicked.
    Clicked(Point),
    /// No candidates on screen: another player's call already closed the
    /// prompt.
    AlreadyResolved,
}

/// Search `frame` for `template` inside the calibrated button area.
///
/// The template is scaled by the window's zoom relative to the reference
/// layout, corrected for the template's authoring size. The returned
/// position is in frame coordinates.
pub fn find_button(
    frame: &RgbImage,
    template: &RgbaImage,
    transform: &Transform,
    accept_threshold: f64,
    config: &LocatorConfig,
    debug: &mut dyn DebugSink,
) -> Result<Located, VisionError> {
    let zoom = transform.scale_x(REFERENCE_SIZE) * config.button_span_live / config.button_span_template;
    let top_left = transform.to_screen(config.search_top_left);
    let bottom_right = transform.to_screen(config.search_bottom_right);
    let Some(region) = crop_clamped(frame, top_left, bottom_right) else {
        log::debug!("button search area {:?}..{:?} is off screen", top_left, bottom_right);
        return Err(VisionError::not_found("button"));
    };
    let origin = Point::new(top_left.x.max(0), top_left.y.max(0));

    let mut found = locate_button(template, &region, zoom, accept_threshold, config, debug)?;
    found.top_left = found.top_left.offset(origin.x, origin.y);
    Ok(found)
}

pub struct GameWindow<S, D, C> {
    screen: S,
    input: D,
    classifier: C,
    templates: Templates,
    config: Config,
    calibrator: Calibrator,
    transform: Option<Transform>,
    park: Point,
    pacer: Pacer,
    debug: Box<dyn DebugSink>,
}

impl<S, D, C> GameWindow<S, D, C>
where
    S: ScreenSource,
    D: InputDriver,
    C: TileClassifier,
{
    pub fn new(screen: S, input: D, classifier: C, templates: Templates, config: Config) -> Self {
        let debug: Box<dyn DebugSink> = if config.debug {
            let dir = config.debug_dir.clone().unwrap_or_else(DirectorySink::default_dir);
            log::info!("debug images go to {}", dir.display());
            Box::new(DirectorySink::new(dir))
        } else {
            Box::new(NullSink)
        };
        let calibrator = Calibrator::new(config.matcher.clone());
        Self {
            screen,
            input,
            classifier,
            templates,
            config,
            calibrator,
            transform: None,
            park: Point::default(),
            pacer: Pacer,
            debug,
        }
    }

    pub fn with_debug_sink(mut self, sink: Box<dyn DebugSink>) -> Self {
        self.debug = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn input(&self) -> &D {
        &self.input
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Adopt a transform from an earlier calibration of the same window.
    pub fn assume_transform(&mut self, transform: Transform) {
        self.park = transform.to_screen(PARK_POSITION);
        self.transform = Some(transform);
    }

    fn timings(&self) -> &Timings {
        &self.config.timings
    }

    fn require_transform(&self) -> Result<Transform, VisionError> {
        self.transform.ok_or(VisionError::NotCalibrated)
    }

    fn capture(&mut self) -> Result<Frame, VisionError> {
        self.screen.capture().map_err(VisionError::Capture)
    }

    fn pause(&self, ms: u64) {
        self.pacer.pause(ms);
    }

    fn move_to(&mut self, p: Point) -> Result<(), VisionError> {
        self.input.move_to(p).map_err(VisionError::Input)
    }

    fn click(&mut self, p: Point) -> Result<(), VisionError> {
        self.input.click(p).map_err(VisionError::Input)
    }

    fn park_pointer(&mut self) -> Result<(), VisionError> {
        let park = self.park;
        self.move_to(park)
    }

    /// Click a canonical anchor.
    fn click_anchor(&mut self, transform: &Transform, anchor: [f64; 2]) -> Result<(), VisionError> {
        self.click(transform.to_screen(anchor))
    }

    /// Capture the screen and calibrate against the main menu reference.
    ///
    /// On success the transform and the parked pointer position are stored
    /// for every later operation. On `NotFound` any previous transform is
    /// dropped.
    pub fn calibrate_menu(&mut self) -> Result<Calibration, VisionError> {
        let frame = self.capture()?;
        let threshold = self.config.matcher.similarity_threshold;
        let result = self.calibrator.calibrate(
            self.templates.menu(),
            frame.image(),
            threshold,
            self.debug.as_mut(),
        );
        match result {
            Ok(calibration) => {
                self.assume_transform(calibration.transform);
                log::info!(
                    "calibrated: {} matches, {} inliers, similarity {:.3}",
                    calibration.matches,
                    calibration.inliers,
                    calibration.similarity
                );
                Ok(calibration)
            }
            Err(e) => {
                self.transform = None;
                Err(e)
            }
        }
    }

    /// Labels and centres of the player's hand, left to right.
    ///
    /// Two captures `frame_gap` apart are combined by their per-pixel
    /// minimum so a hover highlight cannot glue neighbouring tiles together.
    pub fn hand_tiles(&mut self) -> Result<Vec<(Tile, Point)>, VisionError> {
        let transform = self.require_transform()?;
        let first = self.capture()?;
        self.pause(self.timings().frame_gap);
        let second = self.capture()?;
        let combined = first.min_combine(&second)?;

        let params = self.config.hand.params(&transform);
        let regions = segment_along_axis(combined.image(), &params, ScanMode::Forward, self.debug.as_mut());
        let tiles = classify_regions(combined.image(), &regions, &self.classifier);
        log::debug!("hand: {:?}", tiles.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>());
        Ok(tiles)
    }

    /// Click the first hand tile labelled `tile`.
    pub fn discard_tile(&mut self, tile: &Tile) -> Result<Point, VisionError> {
        let hand = self.hand_tiles()?;
        let Some(&(_, at)) = hand.iter().find(|(t, _)| t == tile) else {
            return Err(VisionError::TileNotFound {
                requested: tile.clone(),
                observed: hand.into_iter().map(|(t, _)| t).collect(),
            });
        };
        log::info!("discard {} at {:?}", tile, at);
        self.move_to(at)?;
        self.pause(self.timings().hover);
        self.click(at)?;
        self.pause(self.timings().after_discard);
        self.park_pointer()?;
        Ok(at)
    }

    /// Locate `button` and click its centre if the masked similarity reaches
    /// `threshold`. `Ok(None)` when the button is not on screen.
    pub fn click_button(&mut self, button: Button, threshold: f64) -> Result<Option<Point>, VisionError> {
        let transform = self.require_transform()?;
        self.pause(self.timings().before_button_capture);
        let frame = self.capture()?;
        let found = find_button(
            frame.image(),
            self.templates.button(button),
            &transform,
            threshold,
            &self.config.locator,
            self.debug.as_mut(),
        );
        let located = match found {
            Ok(located) => located,
            Err(VisionError::NotFound { .. }) => {
                log::debug!("{:?} button not on screen", button);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let center = located.center();
        log::info!("click {:?} at {:?} (similarity {:.3})", button, center, located.similarity);
        self.move_to(center)?;
        self.pause(self.timings().click_glide);
        self.click(center)?;
        self.pause(self.timings().after_button);
        self.park_pointer()?;
        Ok(Some(center))
    }

    /// Press "pass" if it is confidently on screen; otherwise do nothing.
    pub fn force_pass(&mut self) -> Result<Option<Point>, VisionError> {
        self.click_button(Button::Pass, 0.7)
    }

    /// Answer a call opportunity. Operations without a call button are
    /// ignored.
    pub fn act_on_call(&mut self, operation: Operation) -> Result<Option<Point>, VisionError> {
        let button = match operation {
            Operation::NoEffect => Button::Pass,
            Operation::Chi => Button::Chii,
            Operation::Peng => Button::Pon,
            Operation::MingGang | Operation::JiaGang => Button::Kan,
            other => {
                log::debug!("{:?} has no call button", other);
                return Ok(None);
            }
        };
        self.click_button(button, 0.0)
    }

    /// Declare riichi, then discard `tile`.
    pub fn riichi(&mut self, tile: &Tile) -> Result<Point, VisionError> {
        self.click_button(Button::Liqi, 0.0)?;
        self.pause(self.timings().liqi_settle);
        self.discard_tile(tile)
    }

    pub fn ron(&mut self) -> Result<Option<Point>, VisionError> {
        self.click_button(Button::Ron, 0.0)
    }

    pub fn tsumo(&mut self) -> Result<Option<Point>, VisionError> {
        self.click_button(Button::Tsumo, 0.0)
    }

    pub fn ryuukyoku(&mut self) -> Result<Option<Point>, VisionError> {
        self.click_button(Button::Ryuukyoku, 0.0)
    }

    pub fn nukidora(&mut self) -> Result<Option<Point>, VisionError> {
        self.click_button(Button::Nuku, 0.0)
    }

    /// Pick which tiles to call with when the game offers several
    /// combinations.
    ///
    /// Candidates are shown as adjacent pairs around the screen centre. The
    /// pair whose labels equal `pair` (in any order) is chosen by clicking
    /// its left tile.
    pub fn click_candidate_meld(&mut self, pair: (Tile, Tile)) -> Result<MeldOutcome, VisionError> {
        let transform = self.require_transform()?;
        let frame = self.capture()?;
        let params = self.config.meld.params(&transform);
        let regions = segment_along_axis(frame.image(), &params, ScanMode::Outward, self.debug.as_mut());
        let candidates = classify_regions(frame.image(), &regions, &self.classifier);

        if candidates.is_empty() {
            log::info!("meld prompt already gone");
            return Ok(MeldOutcome::AlreadyResolved);
        }
        let labels: Vec<Tile> = candidates.iter().map(|(t, _)| t.clone()).collect();
        log::debug!("meld candidates: {:?}", labels);
        if candidates.len() % 2 != 0 {
            return Err(VisionError::InvariantViolation(format!(
                "meld candidates must pair up, found {}: {:?}",
                candidates.len(),
                labels
            )));
        }

        let wanted = sorted_pair(pair.0, pair.1);
        let choice = candidates.chunks_exact(2).find_map(|c| {
            (sorted_pair(c[0].0.clone(), c[1].0.clone()) == wanted).then_some(c[0].1)
        });
        let Some(at) = choice else {
            return Err(VisionError::CombinationNotFound {
                requested: wanted,
                observed: labels,
            });
        };

        self.move_to(at)?;
        self.pause(self.timings().click_glide);
        self.click(at)?;
        self.pause(self.timings().after_meld);
        self.park_pointer()?;
        Ok(MeldOutcome::Clicked(at))
    }

    /// Click through the end-of-game screens until the main menu shows.
    ///
    /// Each attempt waits `menu_poll`, then compares the calibrated window
    /// area with the menu reference. Returns the number of attempts used;
    /// `NotFound` when the menu never came back.
    pub fn return_to_menu(&mut self, max_attempts: u32) -> Result<u32, VisionError> {
        let transform = self.require_transform()?;
        let window_tl = transform.to_screen([0.0, 0.0]);
        let window_br = transform.to_screen([REFERENCE_SIZE.0 as f64, REFERENCE_SIZE.1 as f64]);
        let confirm = transform.to_screen(GAME_END_CONFIRM);

        for attempt in 1..=max_attempts {
            self.pause(self.timings().menu_poll);
            let frame = self.capture()?;
            let score = frame
                .crop(window_tl, window_br)
                .map(|window| similarity(self.templates.menu(), &window))
                .unwrap_or(0.0);
            if score > self.config.menu_similarity {
                log::info!("back on the menu after {} attempts", attempt);
                return Ok(attempt);
            }
            log::info!("Similarity: {:.3}", score);
            self.move_to(confirm)?;
            self.pause(self.timings().confirm_glide);
            self.click(confirm)?;
        }
        Err(VisionError::not_found("menu"))
    }

    /// Queue for a ranked game in `room`.
    pub fn begin_game(&mut self, room: Room, mode: Mode) -> Result<(), VisionError> {
        let transform = self.require_transform()?;
        log::info!("queue ranked {:?} {:?}", room, mode);
        self.pause(self.timings().menu_step);
        self.click_anchor(&transform, RANKED_LOBBY)?;
        self.pause(self.timings().menu_step);
        if room.needs_scroll() {
            self.move_to(transform.to_screen(MENU_BUTTONS[2]))?;
            self.pause(self.timings().drag_settle);
            self.input
                .drag_to(transform.to_screen(MENU_BUTTONS[0]))
                .map_err(VisionError::Input)?;
            self.pause(self.timings().drag_settle);
        }
        self.click_anchor(&transform, MENU_BUTTONS[room.menu_index()])?;
        self.pause(self.timings().menu_step);
        self.click_anchor(&transform, MENU_BUTTONS[mode.menu_index()])
    }

    /// Queue for a casual game from the match lobby.
    pub fn begin_casual_game(&mut self, mode: Mode) -> Result<(), VisionError> {
        let transform = self.require_transform()?;
        log::info!("queue casual {:?}", mode);
        self.pause(self.timings().menu_step);
        self.click_anchor(&transform, MATCH_LOBBY)?;
        self.pause(self.timings().menu_step);
        self.click_anchor(&transform, MENU_BUTTONS[1])?;
        self.pause(self.timings().menu_step);
        self.click_anchor(&transform, MENU_BUTTONS[mode.menu_index()])
    }
}

fn sorted_pair(a: Tile, b: Tile) -> (Tile, Tile) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::test_support::{button_template, noise_image, paste_opaque};
    use nalgebra::Matrix3;

    #[test]
    fn pairs_compare_unordered() {
        assert_eq!(
            sorted_pair(Tile::new("5m"), Tile::new("4m")),
            (Tile::new("4m"), Tile::new("5m"))
        );
    }

    #[test]
    fn find_button_reports_frame_coordinates() {
        let template = button_template(44, 22);
        let mut frame = noise_image(400, 300, 8);
        paste_opaque(&mut frame, &template, 230, 150);
        let config = LocatorConfig {
            search_top_left: [200.0, 100.0],
            search_bottom_right: [330.0, 200.0],
            button_span_live: 220.0,
            button_span_template: 220.0,
            ..LocatorConfig::default()
        };
        // 1920 wide reference mapped onto itself.
        let transform = Transform::from_matrix(Matrix3::identity());
        let found = find_button(&frame, &template, &transform, 0.5, &config, &mut NullSink).unwrap();
        assert!(found.top_left.x.abs_diff(230) <= 2 && found.top_left.y.abs_diff(150) <= 2);
    }

    #[test]
    fn find_button_off_screen_area() {
        let template = button_template(44, 22);
        let frame = noise_image(100, 100, 8);
        let result = find_button(
            &frame,
            &template,
            &Transform::identity(),
            0.0,
            &LocatorConfig::default(),
            &mut NullSink,
        );
        assert!(matches!(result, Err(VisionError::NotFound { .. })));
    }
}
