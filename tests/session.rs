mod common;

use common::*;
use image::RgbImage;
use mahjong_vision::layout::{Mode, Operation, Room};
use mahjong_vision::{Config, GameWindow, MeldOutcome, Point, Tile, Transform, VisionError};

type Window = GameWindow<ScriptedScreen, RecordingDriver, fn(&RgbImage) -> Tile>;

fn window(frames: Vec<RgbImage>, config: Config) -> Window {
    let templates = templates(menu_image(3));
    let classifier: fn(&RgbImage) -> Tile = mark_classifier;
    GameWindow::new(ScriptedScreen::new(frames), RecordingDriver::default(), classifier, templates, config)
}

fn calibrated(frames: Vec<RgbImage>) -> Window {
    let mut w = window(frames, test_config());
    w.assume_transform(Transform::identity());
    w
}

fn table() -> RgbImage {
    RgbImage::from_pixel(1920, 1080, TABLE)
}

/// Three hand tiles at the canonical hand position: 1m, 2p, 3s.
fn hand_frame() -> RgbImage {
    let mut img = table();
    draw_tile(&mut img, 235, 926, 95, 152, IVORY, RED);
    draw_tile(&mut img, 335, 926, 95, 152, IVORY, BLUE);
    draw_tile(&mut img, 435, 926, 95, 152, IVORY, GREEN);
    img
}

/// Candidate pairs (1m, 2p) and (3s, 1m) around the screen centre.
fn meld_frame(count: usize) -> RgbImage {
    let mut img = table();
    let tiles = [(800, RED), (880, BLUE), (1000, GREEN), (1080, RED)];
    for &(x, mark) in tiles.iter().take(count) {
        draw_tile(&mut img, x, 700, 78, 106, IVORY, mark);
    }
    img
}

fn button_config() -> Config {
    let mut config = test_config();
    config.locator.search_top_left = [700.0, 600.0];
    config.locator.search_bottom_right = [900.0, 700.0];
    config.locator.button_span_live = 220.0;
    config
}

fn button_frame(button: Option<usize>) -> RgbImage {
    let mut img = table();
    noise(&mut img, 700, 600, 200, 100, 77);
    if let Some(i) = button {
        paste_button(&mut img, &button_face(60, 24, 100 + i as u64), 760, 630);
    }
    img
}

#[test]
fn calibrates_on_the_menu() {
    let menu = menu_image(3);
    let mut w = window(vec![menu], test_config());
    let cal = w.calibrate_menu().unwrap();
    assert!(cal.similarity > 0.7);
    let t = w.transform().unwrap();
    assert!(t.corner_reprojection_error(&Transform::identity(), 1920.0, 1080.0) < 1.5);
}

#[test]
fn failed_calibration_is_recoverable() {
    let mut w = window(vec![table()], test_config());
    let err = w.calibrate_menu().unwrap_err();
    assert!(err.is_recoverable());
    assert!(w.transform().is_none());
}

#[test]
fn operations_need_calibration() {
    let mut w = window(vec![hand_frame()], test_config());
    assert!(matches!(w.hand_tiles(), Err(VisionError::NotCalibrated)));
    assert!(matches!(w.ron(), Err(VisionError::NotCalibrated)));
    assert!(w.input().events.is_empty());
}

#[test]
fn reads_hand_left_to_right() {
    let mut w = calibrated(vec![hand_frame()]);
    let hand = w.hand_tiles().unwrap();
    assert_eq!(
        hand,
        vec![
            (Tile::new("1m"), Point::new(282, 1002)),
            (Tile::new("2p"), Point::new(382, 1002)),
            (Tile::new("3s"), Point::new(482, 1002)),
        ]
    );
    assert_eq!(w.screen().captures, 2);
}

#[test]
fn highlight_in_one_frame_is_ignored() {
    let mut highlighted = hand_frame();
    // Hover glow bridging the first two tiles.
    fill_rect(&mut highlighted, 320, 960, 30, 60, image::Rgb([255, 255, 255]));
    let mut w = calibrated(vec![hand_frame(), highlighted]);
    let hand = w.hand_tiles().unwrap();
    assert_eq!(hand.len(), 3);
}

#[test]
fn discard_clicks_tile_then_parks() {
    let mut w = calibrated(vec![hand_frame()]);
    let at = w.discard_tile(&Tile::new("2p")).unwrap();
    assert_eq!(at, Point::new(382, 1002));
    assert_eq!(
        w.input().events,
        vec![Event::Move(382, 1002), Event::Click(382, 1002), Event::Move(100, 100)]
    );
}

#[test]
fn discarding_absent_tile_reports_hand() {
    let mut w = calibrated(vec![hand_frame()]);
    match w.discard_tile(&Tile::new("7z")) {
        Err(VisionError::TileNotFound { requested, observed }) => {
            assert_eq!(requested, Tile::new("7z"));
            assert_eq!(observed, vec![Tile::new("1m"), Tile::new("2p"), Tile::new("3s")]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(w.input().events.is_empty());
}

#[test]
fn meld_picks_matching_pair() {
    let mut w = calibrated(vec![meld_frame(4)]);
    let outcome = w.click_candidate_meld((Tile::new("3s"), Tile::new("1m"))).unwrap();
    assert_eq!(outcome, MeldOutcome::Clicked(Point::new(1039, 753)));
    assert_eq!(
        w.input().events,
        vec![Event::Move(1039, 753), Event::Click(1039, 753), Event::Move(100, 100)]
    );
}

#[test]
fn meld_pair_order_does_not_matter() {
    let mut w = calibrated(vec![meld_frame(4)]);
    let outcome = w.click_candidate_meld((Tile::new("2p"), Tile::new("1m"))).unwrap();
    assert_eq!(outcome, MeldOutcome::Clicked(Point::new(839, 753)));
}

#[test]
fn empty_meld_prompt_is_already_resolved() {
    let mut w = calibrated(vec![meld_frame(0)]);
    let outcome = w.click_candidate_meld((Tile::new("1m"), Tile::new("2p"))).unwrap();
    assert_eq!(outcome, MeldOutcome::AlreadyResolved);
    assert!(w.input().events.is_empty());
}

#[test]
fn odd_meld_candidates_violate_invariant() {
    let mut w = calibrated(vec![meld_frame(3)]);
    let err = w.click_candidate_meld((Tile::new("1m"), Tile::new("2p"))).unwrap_err();
    assert!(matches!(err, VisionError::InvariantViolation(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn unknown_meld_pair_is_reported() {
    let mut w = calibrated(vec![meld_frame(4)]);
    let err = w.click_candidate_meld((Tile::new("9p"), Tile::new("1m"))).unwrap_err();
    match err {
        VisionError::CombinationNotFound { requested, observed } => {
            assert_eq!(requested, (Tile::new("1m"), Tile::new("9p")));
            assert_eq!(observed.len(), 4);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn pass_button_is_clicked_when_present() {
    // Button::Pass is index 5 in Button::ALL.
    let mut w = window(vec![button_frame(Some(5))], button_config());
    w.assume_transform(Transform::identity());
    let clicked = w.force_pass().unwrap();
    assert_eq!(clicked, Some(Point::new(790, 642)));
    assert_eq!(
        w.input().events,
        vec![Event::Move(790, 642), Event::Click(790, 642), Event::Move(100, 100)]
    );
}

#[test]
fn absent_button_is_not_clicked() {
    let mut w = window(vec![button_frame(None)], button_config());
    w.assume_transform(Transform::identity());
    assert_eq!(w.force_pass().unwrap(), None);
    assert!(w.input().events.is_empty());
}

#[test]
fn zero_threshold_actions_ignore_other_buttons() {
    // Chii is on screen, Ron is not.
    let mut w = window(vec![button_frame(Some(0)), button_frame(None)], button_config());
    w.assume_transform(Transform::identity());
    assert_eq!(w.ron().unwrap(), None);
    assert_eq!(w.ron().unwrap(), None);
    assert!(w.input().events.is_empty());
}

#[test]
fn call_without_button_does_nothing() {
    let mut w = window(vec![button_frame(Some(0))], button_config());
    w.assume_transform(Transform::identity());
    assert_eq!(w.act_on_call(Operation::Discard).unwrap(), None);
    assert_eq!(w.screen().captures, 0);
    // Button::Chii is index 0.
    assert_eq!(w.act_on_call(Operation::Chi).unwrap(), Some(Point::new(790, 642)));
}

#[test]
fn returns_to_menu_after_confirming() {
    let result_screen = RgbImage::from_pixel(1920, 1080, image::Rgb([250, 250, 250]));
    let mut w = calibrated(vec![result_screen, menu_image(3)]);
    assert_eq!(w.return_to_menu(5).unwrap(), 2);
    assert_eq!(w.input().events, vec![Event::Move(1785, 1003), Event::Click(1785, 1003)]);
}

#[test]
fn return_to_menu_gives_up() {
    let mut w = calibrated(vec![table()]);
    let err = w.return_to_menu(3).unwrap_err();
    assert!(matches!(err, VisionError::NotFound { .. }));
    assert_eq!(w.input().events.len(), 6);
}

#[test]
fn throne_room_needs_a_drag() {
    let mut w = calibrated(vec![table()]);
    w.begin_game(Room::Throne, Mode::SouthFour).unwrap();
    assert_eq!(
        w.input().events,
        vec![
            Event::Click(1348, 321),
            Event::Move(1382, 740),
            Event::Drag(1382, 406),
            Event::Click(1393, 813),
            Event::Click(1382, 573),
        ]
    );
}

#[test]
fn casual_game_goes_through_match_lobby() {
    let mut w = calibrated(vec![table()]);
    w.begin_casual_game(Mode::EastThree).unwrap();
    assert_eq!(
        w.input().events,
        vec![Event::Click(1348, 500), Event::Click(1382, 573), Event::Click(1382, 740)]
    );
}
