//! Integration tests for engine lifecycle
//!
//! These tests validate the complete engine workflow:
//! - Port selection and baud rate changes
//! - Idle/acquiring state transitions
//! - Running the engine on its own thread and shutting it down

mod common;

use common::builders::EngineBuilder;
use common::test_timeout;
use serialscope_rs::engine::{AdvisoryKind, EngineEvent};
use serialscope_rs::transport::DEFAULT_BAUD_RATE;
use serialscope_rs::types::{CaptureMode, EngineState};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_engine_creation_and_shutdown() {
    let rig = EngineBuilder::new().tick_interval_ms(5).build();
    let mut engine = rig.engine;
    let handle = rig.handle;

    let worker = thread::spawn(move || engine.run());
    thread::sleep(Duration::from_millis(30));

    handle.shutdown();
    assert!(worker.join().is_ok(), "Engine thread should exit cleanly");

    let events = handle.drain();
    assert!(events.contains(&EngineEvent::Shutdown));
    // The loop closes the port on the way out
    assert_eq!(handle.state(), EngineState::Idle);
}

#[test]
fn test_engine_stops_when_handles_dropped() {
    let rig = EngineBuilder::new().tick_interval_ms(5).build();
    let mut engine = rig.engine;
    let worker = thread::spawn(move || engine.run());

    drop(rig.handle);
    assert!(worker.join().is_ok());
}

#[test]
fn test_threaded_acquisition() {
    let rig = EngineBuilder::new().tick_interval_ms(5).build();
    let mut engine = rig.engine;
    let handle = rig.handle;
    let mut plot = rig.plot;
    let device = rig.device;

    let worker = thread::spawn(move || engine.run());

    device.push_lines(&["1.0,2.0", "1.5,2.5", "2.0,3.0"]);

    let deadline = Instant::now() + test_timeout() * 10;
    while plot.store().total_points() < 6 && Instant::now() < deadline {
        plot.apply_pending();
        thread::sleep(Duration::from_millis(5));
    }

    handle.shutdown();
    worker.join().unwrap();

    let ch1: Vec<f64> = plot.store().snapshot(1).unwrap().iter().map(|p| p.y).collect();
    assert_eq!(ch1, vec![2.0, 2.5, 3.0]);
}

#[test]
fn test_select_none_then_list_ports() {
    let mut rig = EngineBuilder::new().build();
    rig.engine.tick();
    assert_eq!(rig.handle.state(), EngineState::Continuous);

    assert_eq!(rig.handle.select_port("none").unwrap(), EngineState::Idle);
    rig.engine.tick();
    assert_eq!(rig.engine.state(), EngineState::Idle);

    // Enumeration is independent of the selected port
    assert!(rig.handle.list_available_ports().is_ok());
    assert_eq!(rig.handle.state(), EngineState::Idle);

    let states: Vec<EngineState> = rig
        .handle
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::StateChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![EngineState::Continuous, EngineState::Idle]);
}

#[test]
fn test_open_failure_leaves_engine_idle() {
    let mut rig = EngineBuilder::new().unopened().build();
    rig.device.set_fail_open(true);

    assert!(rig.handle.select_port("/dev/ttyACM7").is_err());
    rig.engine.tick();
    assert_eq!(rig.engine.state(), EngineState::Idle);

    let kinds: Vec<AdvisoryKind> = rig
        .handle
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Advisory(a) => Some(a.kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![AdvisoryKind::OpenFailed]);

    // The port recovers once the device is back
    rig.device.set_fail_open(false);
    assert_eq!(
        rig.handle.select_port("/dev/ttyACM7").unwrap(),
        EngineState::Continuous
    );
}

#[test]
fn test_baud_change_reopens_port() {
    let mut rig = EngineBuilder::new().mode(CaptureMode::Burst).build();
    assert_eq!(rig.handle.set_baud_rate(230_400).unwrap(), EngineState::Burst);
    assert_eq!(rig.handle.baud_rate(), 230_400);

    // Data keeps flowing after the reopen
    rig.device.push_lines(&["start", "1,2", "stop"]);
    rig.engine.tick();
    assert_eq!(rig.ys(0), vec![1.0]);

    rig.handle.reset_defaults().unwrap();
    assert_eq!(rig.handle.baud_rate(), DEFAULT_BAUD_RATE);
    assert_eq!(rig.handle.port(), None);
    assert_eq!(rig.handle.state(), EngineState::Idle);
}

#[test]
fn test_generator_command_reaches_device() {
    let rig = EngineBuilder::new().build();
    rig.handle
        .write_generator_command(1, 1.5, 1e4, serialscope_rs::Waveform::Sine)
        .unwrap();
    assert_eq!(rig.device.written(), b"generate 1 1.5 10000.0 sine\n".to_vec());
}
