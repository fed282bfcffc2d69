//! # SerialScope-RS: Serial Oscilloscope Acquisition Core
//!
//! Streams comma-separated samples from a serial-connected scope device into
//! per-channel rolling buffers and pushes them to a live plot, either point by
//! point (continuous mode) or one captured frame at a time (burst mode). Also
//! drives the device's waveform generator.
//!
//! ## Architecture
//!
//! - **Transport**: `serialport`-backed device connection behind a trait,
//!   with a scripted mock for tests
//! - **Decoder**: pure line-to-sample parsing
//! - **Store**: bounded per-channel buffers
//! - **Engine**: the scheduler tick, run on its own thread, controlled
//!   through a cloneable handle
//! - **Surface**: the narrow interface to whatever draws the plot
//! - **Communication**: Crossbeam channels for commands, events and plot updates
//!
//! ## Configuration
//!
//! The last used port is stored in the platform-appropriate data directory
//! under `dev.serialscope.serialscope-rs`:
//!
//! - **Linux**: `~/.local/share/dev.serialscope.serialscope-rs/`
//! - **macOS**: `~/Library/Application Support/dev.serialscope.serialscope-rs/`
//! - **Windows**: `%APPDATA%\dev.serialscope.serialscope-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use serialscope_rs::{
//!     config::AppConfig,
//!     engine::AcquisitionEngine,
//!     surface::plot_channel,
//!     transport::{share, SerialTransport},
//! };
//!
//! let config = AppConfig::default();
//! let (feed, mut plot) = plot_channel(2, 1024, &config.display.colors);
//! let (mut engine, handle) =
//!     AcquisitionEngine::new(&config, share(SerialTransport::default()), Box::new(feed));
//!
//! std::thread::spawn(move || engine.run());
//! handle.select_port("/dev/ttyACM0")?;
//!
//! loop {
//!     plot.apply_pending();
//!     draw(plot.store());
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod generator;
pub mod store;
pub mod surface;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, AppState};
pub use engine::{AcquisitionEngine, EngineCommand, EngineEvent, EngineHandle};
pub use error::{Result, ScopeError};
pub use generator::{GeneratorCommand, Waveform};
pub use store::DataStore;
pub use surface::{PlotFeed, PlotReceiver, RenderSurface};
pub use transport::{SerialTransport, Transport};
pub use types::{CaptureMode, DataPoint, EngineState, Sample, VerticalRange};
