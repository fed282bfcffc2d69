//! Error handling for SerialScope-RS
//!
//! This module defines the crate error type and a Result alias. None of these
//! errors are fatal: the engine reports them as advisories and keeps running.

use thiserror::Error;

/// Main error type for SerialScope-RS operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Errors raised by the serial port layer
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// A line from the device could not be decoded into a sample
    #[error("Malformed sample {line:?}: {reason}")]
    MalformedSample { line: String, reason: String },

    /// Vertical range with `min >= max` (or non-finite bounds)
    #[error("Invalid range: min {min} must be less than max {max}")]
    InvalidRange { min: f64, max: f64 },

    /// Rollover below 1
    #[error("Invalid rollover {0}: must be at least 1")]
    InvalidRollover(usize),

    /// Baud rate of zero
    #[error("Invalid baud rate {0}")]
    InvalidBaudRate(u32),

    /// Generator parameters outside the device limits
    #[error("Invalid generator setting: {0}")]
    InvalidGenerator(String),

    /// Waveform name not understood by the device
    #[error("Unknown waveform '{0}'")]
    UnknownWaveform(String),

    /// Operation needs an open transport
    #[error("Transport not open: {0}")]
    NotOpen(String),

    /// Burst frame cut off before its `stop` marker
    #[error("Burst frame cut off after {0} lines")]
    IncompleteFrame(usize),

    /// Burst frame without a single decodable sample
    #[error("Burst frame of {0} lines held no samples")]
    EmptyFrame(usize),

    /// Open requested without a selected port
    #[error("No port selected")]
    NoPortSelected,

    /// Channel index outside the configured channel count
    #[error("Unknown channel {0}")]
    UnknownChannel(usize),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// The shared transport lock was poisoned by a panicking holder
    #[error("Transport lock poisoned")]
    LockPoisoned,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a malformed-sample error for `line`
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ScopeError::MalformedSample {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for SerialScope-RS operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serialport::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ScopeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ScopeError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScopeError::InvalidRollover(0);
        assert_eq!(err.to_string(), "Invalid rollover 0: must be at least 1");
    }

    #[test]
    fn test_error_with_context() {
        let err = ScopeError::NoPortSelected;
        let with_ctx = err.with_context("Failed to reopen");
        assert!(with_ctx.to_string().contains("Failed to reopen"));
        assert!(with_ctx.to_string().contains("No port selected"));
    }

    #[test]
    fn test_malformed_sample_error() {
        let err = ScopeError::malformed("1.0,x", "field 1 is not a number");
        assert!(err.to_string().contains("\"1.0,x\""));
        assert!(err.to_string().contains("field 1"));
    }

    #[test]
    fn test_invalid_range_error() {
        let err = ScopeError::InvalidRange { min: 5.0, max: 2.0 };
        assert!(err.to_string().contains("min 5"));
        assert!(err.to_string().contains("max 2"));
    }
}
