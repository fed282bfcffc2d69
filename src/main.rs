//! SerialScope - Main Entry Point
//!
//! Headless acquisition: opens the configured port, runs the engine on its
//! own thread and logs a summary of what arrived once per second.
//!
//! Usage: `serialscope-rs [config.toml] [port]`

use serialscope_rs::{
    config::{default_config_path, AppConfig, AppState},
    engine::{AcquisitionEngine, EngineEvent},
    surface::plot_channel,
    transport::{self, SerialTransport},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> serialscope_rs::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serialscope_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SerialScope");

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from).or_else(default_config_path);
    let port_arg = args.next();

    let mut config = match &config_path {
        Some(path) if path.exists() => AppConfig::load_or_default(path),
        _ => AppConfig::default(),
    };

    // Reconnect to whatever was in use last time unless told otherwise
    let mut app_state = AppState::load_or_default();
    app_state.apply_to(&mut config.serial);
    if let Some(port) = port_arg {
        config.serial.port = Some(port);
    }

    match transport::list_available_ports() {
        Ok(ports) if ports.is_empty() => tracing::info!("No serial ports found"),
        Ok(ports) => tracing::info!("Available ports: {}", ports.join(", ")),
        Err(e) => tracing::warn!("Port enumeration failed: {}", e),
    }

    let serial = SerialTransport::new(None, config.serial.baud_rate);
    let (feed, plot) = plot_channel(
        config.acquisition.channels,
        config.acquisition.plot_queue_size,
        &config.display.colors,
    );
    let mut plot = plot.with_render_style(config.display.render_style);
    let (mut engine, handle) = AcquisitionEngine::new(&config, transport::share(serial), Box::new(feed));

    if let Some(port) = &config.serial.port {
        match handle.select_port(port) {
            Ok(state) => {
                tracing::info!("Acquiring from {} ({})", port, state);
                app_state.update_last_connection(Some(port.as_str()), handle.baud_rate());
                if let Err(e) = app_state.save() {
                    tracing::warn!("Failed to save app state: {}", e);
                }
                if config.generator.apply_on_connect {
                    match handle.apply_generator_settings(&config.generator.channels) {
                        Ok(count) => tracing::info!("Restored {} generator channels", count),
                        Err(e) => tracing::warn!("Generator settings not applied: {}", e),
                    }
                }
            }
            Err(e) => tracing::warn!("Could not open {}: {}", port, e),
        }
    } else {
        tracing::info!("No port configured, engine idle");
    }

    let engine_thread = std::thread::spawn(move || engine.run());

    let frame_interval = config.acquisition.tick_interval();
    let mut last_summary = Instant::now();
    let mut updates = 0usize;

    while !engine_thread.is_finished() {
        updates += plot.apply_pending();

        for event in handle.drain() {
            match event {
                EngineEvent::StateChanged(state) => tracing::info!("State: {}", state),
                EngineEvent::Stats(stats) => tracing::debug!(
                    "{} samples, {} malformed ({:.1}% decoded), {} frames",
                    stats.samples_decoded,
                    stats.malformed_lines,
                    stats.decode_rate(),
                    stats.batches_completed
                ),
                EngineEvent::Shutdown => tracing::info!("Engine shut down"),
                EngineEvent::Advisory(_) | EngineEvent::BatchCaptured { .. } => {}
            }
        }

        if last_summary.elapsed() >= Duration::from_secs(1) {
            let store = plot.store();
            let latest: Vec<String> = store
                .channels()
                .iter()
                .map(|c| match c.buffer.last() {
                    Some(p) => format!("ch{}={:.3}", c.index, p.y),
                    None => format!("ch{}=-", c.index),
                })
                .collect();
            tracing::info!(
                "{} updates, {} points held, y range {}, {} traces, latest {}",
                updates,
                store.total_points(),
                plot.y_range(),
                if plot.render_style().scatter { "scatter" } else { "line" },
                latest.join(" ")
            );
            updates = 0;
            last_summary = Instant::now();
        }

        std::thread::sleep(frame_interval);
    }

    tracing::info!("Shutting down...");
    let _ = engine_thread.join();
    Ok(())
}
