//! Calibration check against the live screen.
//!
//! Usage: `mahjong_vision [config.json] [--buttons]`
//!
//! Captures the first monitor, calibrates it against the menu reference and
//! prints the result as JSON. With `--buttons` every action button is also
//! searched for (nothing is clicked). Exits with 2 when the menu is not on
//! screen.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use mahjong_vision::debug::{DebugSink, DirectorySink, NullSink};
use mahjong_vision::layout::{PARK_POSITION, REFERENCE_SIZE};
use mahjong_vision::session::find_button;
use mahjong_vision::vision::calibrate::Calibrator;
use mahjong_vision::{Button, Config, MonitorCapture, Point, ScreenSource, Templates};

#[derive(Serialize)]
struct ButtonReport {
    button: Button,
    center: Option<Point>,
    similarity: Option<f64>,
}

#[derive(Serialize)]
struct Report {
    captured_at: String,
    frame_size: (u32, u32),
    matrix: [[f64; 3]; 3],
    matches: usize,
    inliers: usize,
    similarity: f64,
    native_layout: bool,
    park: Point,
    buttons: Vec<ButtonReport>,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path.or_else(Config::default_path) {
        Some(path) => Config::load_or_default(&path)?,
        None => Config::default(),
    };
    Ok(config)
}

fn run() -> Result<bool> {
    let mut config_path = None;
    let mut with_buttons = false;
    for arg in std::env::args_os().skip(1) {
        if arg == "--buttons" {
            with_buttons = true;
        } else {
            config_path = Some(PathBuf::from(arg));
        }
    }

    let config = load_config(config_path)?;
    let templates = Templates::load(&config.asset_dir)?;
    let mut debug: Box<dyn DebugSink> = if config.debug {
        Box::new(DirectorySink::new(
            config.debug_dir.clone().unwrap_or_else(DirectorySink::default_dir),
        ))
    } else {
        Box::new(NullSink)
    };

    let mut screen = MonitorCapture::primary()?;
    let frame = screen.capture()?;
    log::info!("captured {}x{}", frame.width(), frame.height());

    let calibrator = Calibrator::new(config.matcher.clone());
    let calibration = match calibrator.calibrate(
        templates.menu(),
        frame.image(),
        config.matcher.similarity_threshold,
        debug.as_mut(),
    ) {
        Ok(c) => c,
        Err(e) if e.is_recoverable() => {
            log::warn!("menu not found on screen: {}", e);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    let transform = calibration.transform;

    let mut buttons = Vec::new();
    if with_buttons {
        for button in Button::ALL {
            let found = find_button(
                frame.image(),
                templates.button(button),
                &transform,
                0.0,
                &config.locator,
                debug.as_mut(),
            );
            let report = match found {
                Ok(located) => ButtonReport {
                    button,
                    center: Some(located.center()),
                    similarity: Some(located.similarity),
                },
                Err(e) if e.is_recoverable() => ButtonReport {
                    button,
                    center: None,
                    similarity: None,
                },
                Err(e) => return Err(e.into()),
            };
            buttons.push(report);
        }
    }

    let report = Report {
        captured_at: frame.captured_at().to_rfc3339(),
        frame_size: (frame.width(), frame.height()),
        matrix: transform.rows(),
        matches: calibration.matches,
        inliers: calibration.inliers,
        similarity: calibration.similarity,
        native_layout: transform.is_identity_like(REFERENCE_SIZE, 2.0),
        park: transform.to_screen(PARK_POSITION),
        buttons,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(true)
}
