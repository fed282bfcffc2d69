//! Sample decoding
//!
//! Turns text lines from the device into [`Sample`]s. Every function here is
//! pure so it can be tested without a transport.
//!
//! # Line Format
//!
//! ```text
//! 1.25,0.75\n
//! ```
//!
//! Fields are comma separated, one per channel, each parsed as `f64`.
//! Whitespace around a field (including the `\r` of a CRLF line ending) is
//! ignored. A line is rejected as a whole when any field fails to parse or
//! when it carries fewer fields than there are channels. Extra fields must
//! still parse but their values are dropped.

use crate::error::{Result, ScopeError};
use crate::types::Sample;

/// Field separator on the wire
pub const FIELD_DELIMITER: char = ',';

/// Line that opens a burst frame
pub const START_MARKER: &str = "start";

/// Line that closes a burst frame
pub const STOP_MARKER: &str = "stop";

/// Strip the line terminator (`\n`, `\r\n`) from a raw line
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Decode one line into a sample with `channels` values
pub fn decode_line(line: &str, channels: usize) -> Result<Sample> {
    let line = strip_line_ending(line);
    if line.trim().is_empty() {
        return Err(ScopeError::malformed(line, "empty line"));
    }

    let mut values = Vec::with_capacity(channels);
    for (index, field) in line.split(FIELD_DELIMITER).enumerate() {
        let field = field.trim();
        match field.parse::<f64>() {
            Ok(value) => values.push(value),
            Err(_) => {
                return Err(ScopeError::malformed(
                    line,
                    format!("field {} ({:?}) is not a number", index, field),
                ))
            }
        }
    }

    if values.len() < channels {
        return Err(ScopeError::malformed(
            line,
            format!("expected {} fields, found {}", channels, values.len()),
        ));
    }

    // Every field must parse, only the first `channels` are kept
    values.truncate(channels);
    Ok(Sample::new(values))
}

/// Decode every line of a burst frame.
///
/// Malformed lines are dropped from the batch and returned separately so the
/// caller can report them; they never abort the batch.
pub fn decode_batch<S: AsRef<str>>(lines: &[S], channels: usize) -> (Vec<Sample>, Vec<ScopeError>) {
    let mut samples = Vec::with_capacity(lines.len());
    let mut rejected = Vec::new();

    for line in lines {
        match decode_line(line.as_ref(), channels) {
            Ok(sample) => samples.push(sample),
            Err(e) => rejected.push(e),
        }
    }

    (samples, rejected)
}

/// Check whether a line is exactly the frame start marker
pub fn is_start_marker(line: &str) -> bool {
    strip_line_ending(line) == START_MARKER
}

/// Check whether a line is exactly the frame stop marker
pub fn is_stop_marker(line: &str) -> bool {
    strip_line_ending(line) == STOP_MARKER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_channels() {
        let sample = decode_line("1.0,2.5", 2).unwrap();
        assert_eq!(sample.values, vec![1.0, 2.5]);
    }

    #[test]
    fn test_decode_with_line_endings_and_spaces() {
        let sample = decode_line(" 1.0 , -2.5\r\n", 2).unwrap();
        assert_eq!(sample.values, vec![1.0, -2.5]);
    }

    #[test]
    fn test_decode_rejects_bad_field() {
        let err = decode_line("1.0,x", 2).unwrap_err();
        assert!(matches!(err, ScopeError::MalformedSample { .. }));
    }

    #[test]
    fn test_decode_rejects_short_line() {
        let err = decode_line("1.0", 2).unwrap_err();
        match err {
            ScopeError::MalformedSample { line, reason } => {
                assert_eq!(line, "1.0");
                assert!(reason.contains("expected 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let sample = decode_line("1,2,3", 2).unwrap();
        assert_eq!(sample.values, vec![1.0, 2.0]);

        // Extra fields are still parsed
        assert!(decode_line("1,2,x", 2).is_err());
        assert!(decode_line("1.0,2.5,x\n", 2).is_err());
    }

    #[test]
    fn test_decode_rejects_empty_line() {
        assert!(decode_line("\n", 1).is_err());
        assert!(decode_line("", 1).is_err());
    }

    #[test]
    fn test_decode_scientific_notation() {
        let sample = decode_line("1e-3,2.5E2", 2).unwrap();
        assert_eq!(sample.values, vec![0.001, 250.0]);
    }

    #[test]
    fn test_decode_batch_drops_bad_lines() {
        let lines = ["1,2", "oops", "3,4"];
        let (samples, rejected) = decode_batch(&lines, 2);
        assert_eq!(samples.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(samples[1].values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_markers_are_exact() {
        assert!(is_start_marker("start\n"));
        assert!(is_start_marker("start\r\n"));
        assert!(!is_start_marker("started"));
        assert!(!is_start_marker(" start"));
        assert!(is_stop_marker("stop"));
        assert!(!is_stop_marker("stop now"));
    }
}
