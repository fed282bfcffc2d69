//! Integration tests for configuration persistence

mod common;

use serialscope_rs::config::{AppConfig, AppState};
use serialscope_rs::generator::Waveform;
use serialscope_rs::types::{CaptureMode, VerticalRange};
use tempfile::TempDir;

#[test]
fn test_config_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.serial.port = Some("/dev/ttyACM0".to_string());
    config.acquisition.mode = CaptureMode::Burst;
    config.acquisition.rollover = 1000;
    config.display.vertical_range = VerticalRange::new(-0.5, 3.5).unwrap();
    config.display.render_style.scatter = true;
    config.generator.channels[1].waveform = Waveform::Sweep;

    config.save(&path).unwrap();
    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_config_file_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[acquisition]\nrollover = 0\n").unwrap();

    assert!(AppConfig::load(&path).is_err());
    assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
}

#[test]
fn test_missing_config_file_falls_back() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::load_or_default(dir.path().join("absent.toml"));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_app_state_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app_state.json");

    assert_eq!(AppState::load_from(&path).unwrap(), AppState::default());

    let mut state = AppState::default();
    state.update_last_connection(Some("COM5"), 9600);
    state.save_to(&path).unwrap();

    assert_eq!(AppState::load_from(&path).unwrap(), state);
}
