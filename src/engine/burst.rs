//! Burst frame assembly
//!
//! In burst mode the device wraps each capture in marker lines:
//!
//! ```text
//! start
//! 0.12,1.40
//! 0.15,1.38
//! ...
//! stop
//! ```
//!
//! [`BurstFramer`] is fed one line at a time. Lines before `start` are
//! discarded, lines between the markers are collected, and the collected
//! lines are handed back when `stop` arrives.

use crate::decoder::{is_start_marker, is_stop_marker};

/// What a pushed line did to the framer
#[derive(Debug, Clone, PartialEq)]
pub enum Framing {
    /// Line seen outside a frame and discarded
    Skipped,
    /// `start` seen; `restarted` is set when it abandoned a frame in progress
    Started { restarted: bool },
    /// Line added to the open frame
    Buffered,
    /// `stop` seen; the frame's lines, markers excluded
    Complete(Vec<String>),
}

/// Collects the lines of one burst frame
#[derive(Debug, Default)]
pub struct BurstFramer {
    active: bool,
    lines: Vec<String>,
}

impl BurstFramer {
    /// Create a framer waiting for `start`
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line
    pub fn push(&mut self, line: String) -> Framing {
        if is_start_marker(&line) {
            let restarted = self.active;
            self.active = true;
            self.lines.clear();
            return Framing::Started { restarted };
        }

        if !self.active {
            // Includes a stray `stop`
            return Framing::Skipped;
        }

        if is_stop_marker(&line) {
            self.active = false;
            return Framing::Complete(std::mem::take(&mut self.lines));
        }

        self.lines.push(line);
        Framing::Buffered
    }

    /// True between `start` and `stop`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Lines collected so far in the open frame
    pub fn buffered(&self) -> usize {
        self.lines.len()
    }

    /// Abandon the open frame; returns how many lines were dropped
    pub fn discard_partial(&mut self) -> usize {
        let dropped = self.lines.len();
        self.reset();
        dropped
    }

    /// Return to waiting for `start`
    pub fn reset(&mut self) {
        self.active = false;
        self.lines.clear();
    }
}
