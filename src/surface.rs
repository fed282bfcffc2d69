//! Render surfaces
//!
//! The engine never draws. After each tick it hands the points it wrote to a
//! [`RenderSurface`], which forwards them to whatever chart the host uses.
//! Every call reports whether the update was delivered. An update that was
//! not delivered is the engine's to retry.
//!
//! - [`PlotFeed`] / [`PlotReceiver`] - channel pair for a UI on another
//!   thread. The receiver keeps its own mirror [`DataStore`] which is the
//!   stable snapshot a renderer reads between engine ticks.
//! - [`NullSurface`] - discards everything (headless runs, benchmarks)

use crate::config::RenderStyle;
use crate::store::DataStore;
use crate::types::{DataPoint, VerticalRange};
use crossbeam_channel::{bounded, Receiver, Sender};

/// Default capacity of the plot update queue
pub const DEFAULT_PLOT_QUEUE: usize = 1024;

/// Narrow interface into an external chart
///
/// Each method returns `false` when the update could not be delivered.
pub trait RenderSurface: Send {
    /// Append points to a channel's trace, keeping at most `max_len`
    fn stream(&mut self, channel: usize, points: &[DataPoint], max_len: usize) -> bool;

    /// Replace a channel's trace, keeping at most `max_len`
    fn replace(&mut self, channel: usize, points: &[DataPoint], max_len: usize) -> bool;

    /// Set the y-axis bounds
    fn set_y_range(&mut self, range: VerticalRange) -> bool;
}

/// Update sent from [`PlotFeed`] to [`PlotReceiver`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlotUpdate {
    /// Points appended to a channel
    Stream {
        channel: usize,
        points: Vec<DataPoint>,
        max_len: usize,
    },
    /// A channel's trace replaced wholesale
    Replace {
        channel: usize,
        points: Vec<DataPoint>,
        max_len: usize,
    },
    /// New y-axis bounds
    YRange(VerticalRange),
}

/// Engine side of a plot channel
#[derive(Debug)]
pub struct PlotFeed {
    sender: Sender<PlotUpdate>,
    dropped: u64,
}

impl PlotFeed {
    /// Updates dropped because the receiver fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn send(&mut self, update: PlotUpdate) -> bool {
        // Never block the tick on a slow renderer
        match self.sender.try_send(update) {
            Ok(()) => true,
            Err(_) => {
                self.dropped += 1;
                if self.dropped.is_power_of_two() {
                    tracing::warn!("Plot queue full, {} updates dropped so far", self.dropped);
                }
                false
            }
        }
    }
}

impl RenderSurface for PlotFeed {
    fn stream(&mut self, channel: usize, points: &[DataPoint], max_len: usize) -> bool {
        self.send(PlotUpdate::Stream {
            channel,
            points: points.to_vec(),
            max_len,
        })
    }

    fn replace(&mut self, channel: usize, points: &[DataPoint], max_len: usize) -> bool {
        self.send(PlotUpdate::Replace {
            channel,
            points: points.to_vec(),
            max_len,
        })
    }

    fn set_y_range(&mut self, range: VerticalRange) -> bool {
        self.send(PlotUpdate::YRange(range))
    }
}

/// UI side of a plot channel
#[derive(Debug)]
pub struct PlotReceiver {
    receiver: Receiver<PlotUpdate>,
    mirror: DataStore,
    y_range: VerticalRange,
    render_style: RenderStyle,
}

impl PlotReceiver {
    /// Apply every queued update to the mirror; returns how many were applied
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.receiver.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, update: PlotUpdate) {
        let result = match update {
            PlotUpdate::Stream {
                channel,
                points,
                max_len,
            } => self
                .mirror
                .set_rollover(max_len)
                .and_then(|_| self.mirror.stream_points(channel, &points)),
            PlotUpdate::Replace {
                channel,
                points,
                max_len,
            } => self.mirror.replace(channel, &points, max_len),
            PlotUpdate::YRange(range) => {
                self.y_range = range;
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!("Dropped plot update: {}", e);
        }
    }

    /// The mirror store a renderer draws from
    pub fn store(&self) -> &DataStore {
        &self.mirror
    }

    /// Active y-axis bounds
    pub fn y_range(&self) -> VerticalRange {
        self.y_range
    }

    /// Draw traces with `style`
    pub fn with_render_style(mut self, style: RenderStyle) -> Self {
        self.render_style = style;
        self
    }

    /// How the renderer should draw the traces
    pub fn render_style(&self) -> RenderStyle {
        self.render_style
    }

    /// Updates waiting to be applied
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Create a connected feed/receiver pair
pub fn plot_channel(
    channel_count: usize,
    capacity: usize,
    palette: &[[u8; 4]],
) -> (PlotFeed, PlotReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    let feed = PlotFeed { sender, dropped: 0 };
    let mirror = DataStore::new(channel_count, crate::store::DEFAULT_ROLLOVER, palette);
    let receiver = PlotReceiver {
        receiver,
        mirror,
        y_range: VerticalRange::default(),
        render_style: RenderStyle::default(),
    };
    (feed, receiver)
}

/// Surface that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn stream(&mut self, _channel: usize, _points: &[DataPoint], _max_len: usize) -> bool {
        true
    }

    fn replace(&mut self, _channel: usize, _points: &[DataPoint], _max_len: usize) -> bool {
        true
    }

    fn set_y_range(&mut self, _range: VerticalRange) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_PALETTE;

    fn points(values: &[(f64, f64)]) -> Vec<DataPoint> {
        values.iter().map(|&(x, y)| DataPoint::new(x, y)).collect()
    }

    #[test]
    fn test_feed_to_mirror() {
        let (mut feed, mut receiver) = plot_channel(2, 16, &DEFAULT_PALETTE);

        feed.stream(0, &points(&[(0.0, 1.0), (0.1, 2.0)]), 3);
        feed.stream(0, &points(&[(0.2, 3.0), (0.3, 4.0)]), 3);
        feed.replace(1, &points(&[(0.0, 5.0), (1.0, 6.0)]), 2);
        feed.set_y_range(VerticalRange::new(0.0, 3.5).unwrap());

        assert_eq!(receiver.pending(), 4);
        assert_eq!(receiver.apply_pending(), 4);

        let ch0 = receiver.store().snapshot(0).unwrap();
        assert_eq!(ch0, points(&[(0.1, 2.0), (0.2, 3.0), (0.3, 4.0)]));
        let ch1 = receiver.store().snapshot(1).unwrap();
        assert_eq!(ch1, points(&[(0.0, 5.0), (1.0, 6.0)]));
        assert_eq!(receiver.y_range(), VerticalRange::new(0.0, 3.5).unwrap());
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let (mut feed, mut receiver) = plot_channel(1, 1, &DEFAULT_PALETTE);
        assert!(feed.stream(0, &points(&[(0.0, 1.0)]), 10));
        assert!(!feed.stream(0, &points(&[(1.0, 2.0)]), 10));
        assert!(!feed.set_y_range(VerticalRange::default()));
        assert_eq!(feed.dropped(), 2);

        receiver.apply_pending();
        assert_eq!(receiver.store().snapshot(0).unwrap(), points(&[(0.0, 1.0)]));

        // Room again once the receiver caught up
        assert!(feed.replace(0, &points(&[(2.0, 3.0)]), 10));
        receiver.apply_pending();
        assert_eq!(receiver.store().snapshot(0).unwrap(), points(&[(2.0, 3.0)]));
    }

    #[test]
    fn test_render_style() {
        let (_feed, receiver) = plot_channel(1, 1, &DEFAULT_PALETTE);
        assert!(!receiver.render_style().scatter);

        let receiver = receiver.with_render_style(RenderStyle { scatter: true });
        assert!(receiver.render_style().scatter);
    }

    #[test]
    fn test_unknown_channel_is_ignored() {
        let (mut feed, mut receiver) = plot_channel(1, 4, &DEFAULT_PALETTE);
        feed.stream(5, &points(&[(0.0, 1.0)]), 10);
        assert_eq!(receiver.apply_pending(), 1);
        assert_eq!(receiver.store().total_points(), 0);
    }

    #[test]
    fn test_null_surface() {
        let mut surface = NullSurface;
        assert!(surface.stream(0, &points(&[(0.0, 1.0)]), 1));
        assert!(surface.replace(0, &[], 1));
        assert!(surface.set_y_range(VerticalRange::default()));
    }
}
