//! Core data types for SerialScope-RS
//!
//! This module contains the small value types shared by the decoder, the
//! rolling data store, the engine and the render surfaces.
//!
//! # Main Types
//!
//! - [`DataPoint`] - A single `(x, y)` pair as drawn by the plot
//! - [`Sample`] - One decoded line: one value per channel
//! - [`VerticalRange`] - Validated y-axis bounds
//! - [`CaptureMode`] - Continuous streaming vs. framed burst capture
//! - [`EngineState`] - Whether the engine is idle or acquiring
//! - [`AcquisitionStats`] - Counters published by the engine

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};

/// Default palette for channel traces (red, blue, green, yellow, orange, purple)
pub const DEFAULT_PALETTE: [[u8; 4]; 6] = [
    [255, 0, 0, 255],
    [0, 0, 255, 255],
    [0, 128, 0, 255],
    [255, 255, 0, 255],
    [255, 165, 0, 255],
    [128, 0, 128, 255],
];

/// Pick a palette color for a channel index, cycling when there are more
/// channels than colors.
pub fn palette_color(palette: &[[u8; 4]], index: usize) -> [u8; 4] {
    if palette.is_empty() {
        DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()]
    } else {
        palette[index % palette.len()]
    }
}

/// A single plotted point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Elapsed seconds (continuous mode) or sample index (burst mode)
    pub x: f64,
    /// Decoded value
    pub y: f64,
}

impl DataPoint {
    /// Create a new data point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// As an `[x, y]` pair, the shape most plotting crates take
    pub fn as_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// One decoded line from the device, one value per channel
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Values in channel order
    pub values: Vec<f64>,
}

impl Sample {
    /// Create a sample from channel values
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Value for a channel, if present
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Transpose a batch of samples into per-channel y-series.
    ///
    /// Every sample is expected to carry at least `channels` values; the
    /// decoder guarantees this for anything it returns.
    pub fn columns(samples: &[Sample], channels: usize) -> Vec<Vec<f64>> {
        let mut columns = vec![Vec::with_capacity(samples.len()); channels];
        for sample in samples {
            for (channel, column) in columns.iter_mut().enumerate() {
                if let Some(value) = sample.channel(channel) {
                    column.push(value);
                }
            }
        }
        columns
    }
}

/// Y-axis bounds with `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalRange {
    /// Lower bound
    pub start: f64,
    /// Upper bound
    pub end: f64,
}

impl VerticalRange {
    /// Create a validated range
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ScopeError::InvalidRange { min, max });
        }
        Ok(Self {
            start: min,
            end: max,
        })
    }

    /// Check the invariant on a range that did not come through [`VerticalRange::new`]
    /// (e.g. one deserialized from a config file)
    pub fn validate(&self) -> Result<()> {
        Self::new(self.start, self.end).map(|_| ())
    }

    /// Distance between the bounds
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Check whether a value lies inside the range (inclusive)
    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.end
    }
}

impl Default for VerticalRange {
    fn default() -> Self {
        Self {
            start: -0.5,
            end: 3.5,
        }
    }
}

impl std::fmt::Display for VerticalRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// How incoming lines are turned into plot updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// One sample per line, streamed with elapsed-time x values
    #[default]
    Continuous,
    /// Frames delimited by `start`/`stop` lines replace each channel at once
    Burst,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Continuous => write!(f, "Continuous"),
            CaptureMode::Burst => write!(f, "Burst"),
        }
    }
}

/// Acquisition state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No transport open
    Idle,
    /// Streaming line by line
    Continuous,
    /// Capturing framed batches
    Burst,
}

impl EngineState {
    /// State for an open transport in the given mode
    pub fn acquiring(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Continuous => EngineState::Continuous,
            CaptureMode::Burst => EngineState::Burst,
        }
    }

    /// True unless idle
    pub fn is_acquiring(&self) -> bool {
        !matches!(self, EngineState::Idle)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Continuous => write!(f, "Continuous"),
            EngineState::Burst => write!(f, "Burst"),
        }
    }
}

/// Statistics about the acquisition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionStats {
    /// Number of ticks run
    pub ticks: u64,
    /// Lines read from the transport (including framing lines)
    pub lines_read: u64,
    /// Samples decoded successfully
    pub samples_decoded: u64,
    /// Lines dropped as malformed
    pub malformed_lines: u64,
    /// Burst frames completed and applied
    pub batches_completed: u64,
    /// Burst frames discarded because the stream ran dry before `stop`
    pub batches_discarded: u64,
    /// Transport read failures
    pub read_errors: u64,
    /// Events dropped because the event queue was full
    pub dropped_events: u64,
}

impl AcquisitionStats {
    /// Share of data lines that decoded, as a percentage
    pub fn decode_rate(&self) -> f64 {
        let total = self.samples_decoded + self.malformed_lines;
        if total == 0 {
            100.0
        } else {
            (self.samples_decoded as f64 / total as f64) * 100.0
        }
    }
}
