//! Waveform generator commands
//!
//! The device carries a small signal generator per channel that is driven by
//! a single text command:
//!
//! ```text
//! generate {channel} {amplitude} {frequency} {waveform}\n
//! ```
//!
//! No acknowledgement is sent back, so commands are fire-and-forget.

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Command keyword on the wire
pub const GENERATE_KEYWORD: &str = "generate";

/// Largest peak-to-peak amplitude the generator accepts (V)
pub const MAX_AMPLITUDE_VPP: f64 = 2.0;

/// Largest output frequency the generator accepts (Hz)
pub const MAX_FREQUENCY_HZ: f64 = 62_500_000.0;

/// Generator output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Sine wave
    #[default]
    Sine,
    /// Square wave
    #[serde(rename = "sqr")]
    Square,
    /// Triangle wave
    #[serde(rename = "tri")]
    Triangle,
    /// Frequency sweep
    Sweep,
    /// Constant level
    Dc,
}

impl Waveform {
    /// All waveforms in the order the control panel lists them
    pub fn all() -> &'static [Waveform] {
        &[
            Waveform::Sine,
            Waveform::Square,
            Waveform::Triangle,
            Waveform::Sweep,
            Waveform::Dc,
        ]
    }

    /// Name used on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "sqr",
            Waveform::Triangle => "tri",
            Waveform::Sweep => "sweep",
            Waveform::Dc => "dc",
        }
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl FromStr for Waveform {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Waveform::all()
            .iter()
            .copied()
            .find(|w| w.wire_name() == s)
            .ok_or_else(|| ScopeError::UnknownWaveform(s.to_string()))
    }
}

/// Per-channel generator settings as held by the control panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Peak-to-peak amplitude in volts
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    /// Output shape
    pub waveform: Waveform,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            amplitude: 1.5,
            frequency: 1e4,
            waveform: Waveform::Sine,
        }
    }
}

impl GeneratorSettings {
    /// Build the command for a channel from these settings
    pub fn command(&self, channel: u32) -> Result<GeneratorCommand> {
        GeneratorCommand::new(channel, self.amplitude, self.frequency, self.waveform)
    }
}

/// A validated `generate` command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorCommand {
    /// Generator channel (1-based, as printed on the device)
    pub channel: u32,
    /// Peak-to-peak amplitude in volts
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    /// Output shape
    pub waveform: Waveform,
}

impl GeneratorCommand {
    /// Create a command, checking the values against the generator limits
    pub fn new(channel: u32, amplitude: f64, frequency: f64, waveform: Waveform) -> Result<Self> {
        if channel == 0 {
            return Err(ScopeError::InvalidGenerator(
                "channel numbers start at 1".to_string(),
            ));
        }
        if !(0.0..=MAX_AMPLITUDE_VPP).contains(&amplitude) {
            return Err(ScopeError::InvalidGenerator(format!(
                "amplitude {} Vpp outside 0..={}",
                amplitude, MAX_AMPLITUDE_VPP
            )));
        }
        if !(0.0..=MAX_FREQUENCY_HZ).contains(&frequency) {
            return Err(ScopeError::InvalidGenerator(format!(
                "frequency {} Hz outside 0..={}",
                frequency, MAX_FREQUENCY_HZ
            )));
        }

        Ok(Self {
            channel,
            amplitude,
            frequency,
            waveform,
        })
    }

    /// Wire form, including the trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}\n",
            GENERATE_KEYWORD,
            self.channel,
            wire_float(self.amplitude),
            wire_float(self.frequency),
            self.waveform
        )
    }
}

/// Format a value the way the device firmware expects floats: always with a
/// decimal point, so `1e4` goes out as `10000.0`
fn wire_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

impl FromStr for GeneratorCommand {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        match fields.as_slice() {
            &[GENERATE_KEYWORD, channel, amplitude, frequency, waveform] => {
                let bad = |what: &str, value: &str| {
                    ScopeError::InvalidGenerator(format!("{} {:?} is not a number", what, value))
                };
                let channel = channel.parse().map_err(|_| bad("channel", channel))?;
                let amplitude = amplitude.parse().map_err(|_| bad("amplitude", amplitude))?;
                let frequency = frequency.parse().map_err(|_| bad("frequency", frequency))?;
                GeneratorCommand::new(channel, amplitude, frequency, waveform.parse()?)
            }
            _ => Err(ScopeError::InvalidGenerator(format!(
                "not a generate command: {:?}",
                s.trim_end()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_format() {
        let cmd = GeneratorCommand::new(1, 1.5, 1e4, Waveform::Sine).unwrap();
        assert_eq!(cmd.to_line(), "generate 1 1.5 10000.0 sine\n");

        let cmd = GeneratorCommand::new(2, 0.25, 250.5, Waveform::Square).unwrap();
        assert_eq!(cmd.to_line(), "generate 2 0.25 250.5 sqr\n");

        let cmd = GeneratorCommand::new(1, 1.0, 0.0, Waveform::Dc).unwrap();
        assert_eq!(cmd.to_line(), "generate 1 1.0 0.0 dc\n");
    }

    #[test]
    fn test_waveform_names() {
        for waveform in Waveform::all() {
            let parsed: Waveform = waveform.to_string().parse().unwrap();
            assert_eq!(parsed, *waveform);
        }
        assert!(matches!(
            "sawtooth".parse::<Waveform>(),
            Err(ScopeError::UnknownWaveform(_))
        ));
    }

    #[test]
    fn test_waveform_serde_uses_wire_names() {
        let json = serde_json::to_string(&Waveform::Triangle).unwrap();
        assert_eq!(json, "\"tri\"");
        let parsed: Waveform = serde_json::from_str("\"dc\"").unwrap();
        assert_eq!(parsed, Waveform::Dc);
    }

    #[test]
    fn test_command_limits() {
        assert!(GeneratorCommand::new(0, 1.0, 100.0, Waveform::Sine).is_err());
        assert!(GeneratorCommand::new(1, 2.5, 100.0, Waveform::Sine).is_err());
        assert!(GeneratorCommand::new(1, 1.0, -1.0, Waveform::Sine).is_err());
        assert!(GeneratorCommand::new(1, 1.0, 7e7, Waveform::Sine).is_err());
        assert!(GeneratorCommand::new(1, 2.0, MAX_FREQUENCY_HZ, Waveform::Dc).is_ok());
    }

    #[test]
    fn test_parse_command() {
        let cmd: GeneratorCommand = "generate 2 1.5 10000 tri\n".parse().unwrap();
        assert_eq!(cmd.channel, 2);
        assert_eq!(cmd.amplitude, 1.5);
        assert_eq!(cmd.frequency, 10000.0);
        assert_eq!(cmd.waveform, Waveform::Triangle);

        assert!("generate 1 1.5".parse::<GeneratorCommand>().is_err());
        assert!("reset".parse::<GeneratorCommand>().is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = GeneratorSettings::default();
        let cmd = settings.command(1).unwrap();
        assert_eq!(cmd.to_line(), "generate 1 1.5 10000.0 sine\n");
    }
}
