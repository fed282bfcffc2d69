//! Application configuration
//!
//! Everything the engine needs at construction time, loaded from a TOML
//! file. Every section carries serde defaults so a partial file (or none at
//! all) still yields a usable configuration.
//!
//! # Main Types
//!
//! - [`AppConfig`] - Top level, one field per section
//! - [`SerialConfig`] - Port and baud rate to open at startup
//! - [`AcquisitionConfig`] - Channel count, capture mode, rollover and timing
//! - [`DisplayConfig`] - Trace colors, render style and y-axis bounds
//!
//! Generator settings are kept per channel so the control panel can restore
//! them; they are only sent to the device on request.

use crate::error::{Result, ScopeError};
use crate::generator::GeneratorSettings;
use crate::store::DEFAULT_ROLLOVER;
use crate::transport::DEFAULT_BAUD_RATE;
use crate::types::{CaptureMode, VerticalRange, DEFAULT_PALETTE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of device channels
pub const DEFAULT_CHANNELS: usize = 2;

/// Default scheduler tick in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 25;

/// Default interval between published statistics in milliseconds
pub const DEFAULT_STATS_INTERVAL_MS: u64 = 500;

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port to open at startup; `None` starts idle
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Acquisition settings, fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Number of device channels
    pub channels: usize,

    /// Continuous streaming or framed burst capture
    pub mode: CaptureMode,

    /// Points retained per channel in continuous mode
    pub rollover: usize,

    /// Scheduler tick in milliseconds
    pub tick_interval_ms: u64,

    /// How often statistics are published, in milliseconds
    pub stats_interval_ms: u64,

    /// Capacity of the control command queue
    pub command_queue_size: usize,

    /// Capacity of the engine event queue
    pub event_queue_size: usize,

    /// Capacity of the plot update queue
    pub plot_queue_size: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            mode: CaptureMode::Continuous,
            rollover: DEFAULT_ROLLOVER,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            stats_interval_ms: DEFAULT_STATS_INTERVAL_MS,
            command_queue_size: 256,
            event_queue_size: 1024,
            plot_queue_size: crate::surface::DEFAULT_PLOT_QUEUE,
        }
    }
}

impl AcquisitionConfig {
    /// Tick interval as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Stats interval as a duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

/// How traces are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderStyle {
    /// Draw markers instead of connected lines
    pub scatter: bool,
}

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Trace colors (RGBA), cycled over the channels
    pub colors: Vec<[u8; 4]>,

    /// Line or scatter traces
    pub render_style: RenderStyle,

    /// Initial y-axis bounds
    pub vertical_range: VerticalRange,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.to_vec(),
            render_style: RenderStyle::default(),
            vertical_range: VerticalRange::default(),
        }
    }
}

/// Generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Push `channels` to the device right after the port opens
    pub apply_on_connect: bool,

    /// Per-channel settings, index 0 is generator channel 1
    pub channels: Vec<GeneratorSettings>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            apply_on_connect: false,
            channels: vec![GeneratorSettings::default(); DEFAULT_CHANNELS],
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Serial connection
    #[serde(default)]
    pub serial: SerialConfig,

    /// Acquisition
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Display
    #[serde(default)]
    pub display: DisplayConfig,

    /// Waveform generator
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            acquisition: AcquisitionConfig::default(),
            display: DisplayConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        if acq.channels == 0 {
            return Err(ScopeError::Config("channel count must be at least 1".to_string()));
        }
        if acq.rollover == 0 {
            return Err(ScopeError::InvalidRollover(acq.rollover));
        }
        if acq.tick_interval_ms == 0 {
            return Err(ScopeError::Config("tick interval must be at least 1 ms".to_string()));
        }
        if acq.command_queue_size == 0 || acq.event_queue_size == 0 || acq.plot_queue_size == 0 {
            return Err(ScopeError::Config("queue sizes must be at least 1".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ScopeError::InvalidBaudRate(0));
        }
        self.display.vertical_range.validate()?;

        for (i, settings) in self.generator.channels.iter().enumerate() {
            settings
                .command(i as u32 + 1)
                .map_err(|e| e.with_context(format!("generator channel {}", i + 1)))?;
        }
        Ok(())
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ScopeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScopeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ScopeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
