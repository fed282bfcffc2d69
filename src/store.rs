//! Rolling data store
//!
//! One bounded buffer per channel. Streamed points are appended and the
//! oldest points evicted once the buffer exceeds the rollover; replaced
//! points discard everything that was there before.
//!
//! Changing the rollover never truncates a buffer on the spot. The new bound
//! is applied by the next write to that buffer, so a reader holding the
//! previous contents never sees a buffer shrink underneath it.

use crate::error::{Result, ScopeError};
use crate::types::{palette_color, DataPoint};
use std::collections::VecDeque;

/// Default number of points retained per channel
pub const DEFAULT_ROLLOVER: usize = 5000;

/// Ordered, bounded sequence of points
#[derive(Debug, Clone, Default)]
pub struct RollingBuffer {
    points: VecDeque<DataPoint>,
}

impl RollingBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append points, then evict the oldest until `len <= rollover`
    pub fn stream(&mut self, points: &[DataPoint], rollover: usize) {
        let rollover = rollover.max(1);
        // Only the newest `rollover` of the incoming points can survive
        let skip = points.len().saturating_sub(rollover);
        self.points.extend(points[skip..].iter().copied());
        self.evict_to(rollover);
    }

    /// Discard the current contents and install `points`, keeping at most
    /// the first `rollover` of them
    pub fn replace(&mut self, points: &[DataPoint], rollover: usize) {
        let rollover = rollover.max(1);
        self.points.clear();
        self.points.extend(points.iter().take(rollover).copied());
    }

    fn evict_to(&mut self, rollover: usize) {
        while self.points.len() > rollover {
            self.points.pop_front();
        }
    }

    /// Number of points held
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no points are held
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Remove all points
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Iterate points oldest first
    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    /// Most recent point
    pub fn last(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    /// Copy the points out (oldest first)
    pub fn to_vec(&self) -> Vec<DataPoint> {
        self.points.iter().copied().collect()
    }

    /// Points as `[x, y]` pairs for plotting
    pub fn as_plot_points(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(DataPoint::as_array).collect()
    }

    /// Smallest and largest y value held
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.points.iter().map(|p| p.y);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y))))
    }
}

/// One logical signal line
#[derive(Debug, Clone)]
pub struct Channel {
    /// Stable 0-based index
    pub index: usize,
    /// Trace color (RGBA)
    pub color: [u8; 4],
    /// Retained points
    pub buffer: RollingBuffer,
}

impl Channel {
    /// Create an empty channel
    pub fn new(index: usize, color: [u8; 4]) -> Self {
        Self {
            index,
            color,
            buffer: RollingBuffer::new(),
        }
    }
}

/// Per-channel rolling buffers sharing one rollover bound
#[derive(Debug, Clone)]
pub struct DataStore {
    channels: Vec<Channel>,
    rollover: usize,
}

impl DataStore {
    /// Create a store with `channel_count` channels colored from `palette`
    pub fn new(channel_count: usize, rollover: usize, palette: &[[u8; 4]]) -> Self {
        let channels = (0..channel_count)
            .map(|i| Channel::new(i, palette_color(palette, i)))
            .collect();

        Self {
            channels,
            rollover: rollover.max(1),
        }
    }

    /// Current rollover bound
    pub fn rollover(&self) -> usize {
        self.rollover
    }

    /// Change the bound used by subsequent writes
    pub fn set_rollover(&mut self, rollover: usize) -> Result<()> {
        if rollover < 1 {
            return Err(ScopeError::InvalidRollover(rollover));
        }
        self.rollover = rollover;
        Ok(())
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// All channels
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// A single channel
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    fn channel_mut(&mut self, index: usize) -> Result<&mut Channel> {
        self.channels
            .get_mut(index)
            .ok_or(ScopeError::UnknownChannel(index))
    }

    /// Append one point to a channel
    pub fn stream(&mut self, channel: usize, x: f64, y: f64) -> Result<()> {
        self.stream_points(channel, &[DataPoint::new(x, y)])
    }

    /// Append several points to a channel in order
    pub fn stream_points(&mut self, channel: usize, points: &[DataPoint]) -> Result<()> {
        let rollover = self.rollover;
        self.channel_mut(channel)?.buffer.stream(points, rollover);
        Ok(())
    }

    /// Replace a channel's contents, keeping at most `rollover_hint` points
    pub fn replace(&mut self, channel: usize, points: &[DataPoint], rollover_hint: usize) -> Result<()> {
        self.channel_mut(channel)?.buffer.replace(points, rollover_hint);
        Ok(())
    }

    /// Copy of a channel's points
    pub fn snapshot(&self, channel: usize) -> Option<Vec<DataPoint>> {
        self.channel(channel).map(|c| c.buffer.to_vec())
    }

    /// Empty every channel
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.buffer.clear();
        }
    }

    /// Total points held across channels
    pub fn total_points(&self) -> usize {
        self.channels.iter().map(|c| c.buffer.len()).sum()
    }
}
