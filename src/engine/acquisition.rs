//! The acquisition tick loop
//!
//! Each tick:
//! 1. Applies queued configuration commands
//! 2. Pushes a pending y-range change to the surface
//! 3. Resends the full trace of any channel the surface fell behind on
//! 4. Drains the transport (continuous) or captures one frame (burst)
//! 5. Publishes a state change if the transport opened or closed
//!
//! A tick never blocks waiting for bytes. Anything not yet complete stays in
//! the transport for the next tick. It never blocks on the surface either: an
//! update the surface could not take is retried on a later tick.

use super::burst::{BurstFramer, Framing};
use super::{AdvisoryKind, EngineCommand, EngineEvent, EngineHandle, EventSink};
use crate::config::{AcquisitionConfig, AppConfig};
use crate::decoder::{decode_batch, decode_line};
use crate::error::{Result, ScopeError};
use crate::store::DataStore;
use crate::surface::RenderSurface;
use crate::transport::{self, SharedTransport};
use crate::types::{AcquisitionStats, CaptureMode, DataPoint, EngineState, Sample, VerticalRange};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reads, decodes and plots samples on a fixed schedule
pub struct AcquisitionEngine {
    /// Acquisition settings
    config: AcquisitionConfig,
    /// Command receiver from the handles
    command_rx: Receiver<EngineCommand>,
    /// Event sender to the handles
    events: EventSink,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Device connection, shared with the handles
    transport: SharedTransport,
    /// Where plotted points go
    surface: Box<dyn RenderSurface>,
    /// Per-channel rolling buffers
    store: DataStore,
    /// Active y-axis bounds
    vertical_range: VerticalRange,
    /// Range waiting to be pushed to the surface
    pending_range: Option<VerticalRange>,
    /// Channels whose surface trace missed an update
    stale: Vec<bool>,
    /// Burst frame assembly
    framer: BurstFramer,
    /// x origin in continuous mode
    start: Instant,
    /// State published last
    last_state: EngineState,
    /// Statistics
    stats: AcquisitionStats,
    /// Last tick time for rate limiting
    last_tick_time: Instant,
    /// Last time stats were published
    last_stats_time: Instant,
}

impl AcquisitionEngine {
    /// Create an engine bound to a transport and a render surface
    pub fn new(
        config: &AppConfig,
        transport: SharedTransport,
        surface: Box<dyn RenderSurface>,
    ) -> (Self, EngineHandle) {
        let acq = config.acquisition.clone();
        let (cmd_tx, cmd_rx) = bounded(acq.command_queue_size.max(1));
        let (event_tx, event_rx) = bounded(acq.event_queue_size.max(1));
        let events = EventSink::new(event_tx);

        let store = DataStore::new(acq.channels, acq.rollover, &config.display.colors);
        let channels = store.channel_count();
        let vertical_range = config.display.vertical_range;

        let handle = EngineHandle::new(cmd_tx, event_rx, events.clone(), transport.clone(), acq.mode);

        let engine = Self {
            config: acq,
            command_rx: cmd_rx,
            events,
            running: Arc::new(AtomicBool::new(true)),
            transport,
            surface,
            store,
            vertical_range,
            pending_range: Some(vertical_range),
            stale: vec![false; channels],
            framer: BurstFramer::new(),
            start: Instant::now(),
            last_state: EngineState::Idle,
            stats: AcquisitionStats::default(),
            last_tick_time: Instant::now(),
            last_stats_time: Instant::now(),
        };

        (engine, handle)
    }

    /// Run ticks until shut down
    pub fn run(&mut self) {
        tracing::info!(
            "Acquisition engine started ({} mode, {} channels, {} ms tick)",
            self.config.mode,
            self.config.channels,
            self.config.tick_interval_ms
        );

        while self.running.load(Ordering::SeqCst) {
            self.tick();

            if self.last_stats_time.elapsed() >= self.config.stats_interval() {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }

            self.rate_limit();
        }

        // Cleanup
        if let Ok(mut t) = transport::lock(&self.transport) {
            t.close();
        }
        self.events.emit(EngineEvent::Shutdown);
        tracing::info!("Acquisition engine stopped");
    }

    /// Run one scheduler tick
    pub fn tick(&mut self) {
        self.stats.ticks += 1;
        self.process_commands();

        if let Some(range) = self.pending_range {
            if self.surface.set_y_range(range) {
                self.pending_range = None;
            }
        }
        self.resync_surface();

        match self.config.mode {
            CaptureMode::Continuous => self.drain_continuous(),
            CaptureMode::Burst => self.capture_burst(),
        }

        self.publish_state();
    }

    /// Process pending commands from the handles
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SetRollover(rollover) => match self.store.set_rollover(rollover) {
                Ok(()) => tracing::debug!("Rollover set to {}", rollover),
                Err(e) => self.events.advise(AdvisoryKind::InvalidConfig, &e),
            },
            EngineCommand::SetVerticalRange(range) => {
                tracing::debug!("Vertical range set to {}", range);
                self.vertical_range = range;
                self.pending_range = Some(range);
            }
            EngineCommand::ClearData => self.clear_data(),
            EngineCommand::RequestStats => self.send_stats(),
            EngineCommand::Shutdown => {
                tracing::info!("Shutdown requested");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Read the next complete line, if the transport is open and has one
    fn next_line(&self) -> Result<Option<String>> {
        let mut transport = transport::lock(&self.transport)?;
        if !transport.is_open() || transport.bytes_available()? == 0 {
            return Ok(None);
        }
        transport.read_line()
    }

    /// Like [`Self::next_line`], reporting failures and treating them as
    /// the end of input for this tick
    fn read_or_report(&mut self) -> Option<String> {
        match self.next_line() {
            Ok(Some(line)) => {
                self.stats.lines_read += 1;
                Some(line)
            }
            Ok(None) => None,
            Err(e) => {
                self.stats.read_errors += 1;
                self.events.advise(AdvisoryKind::ReadFailed, &e);
                None
            }
        }
    }

    fn report_malformed(&mut self, error: &ScopeError) {
        self.stats.malformed_lines += 1;
        self.events.advise(AdvisoryKind::MalformedSample, error);
    }

    /// Drain every complete line, streaming one point per channel per sample
    fn drain_continuous(&mut self) {
        let channels = self.store.channel_count();
        let mut pending: Vec<Vec<DataPoint>> = vec![Vec::new(); channels];

        while let Some(line) = self.read_or_report() {
            match decode_line(&line, channels) {
                Ok(sample) => {
                    let x = self.start.elapsed().as_secs_f64();
                    for (channel, points) in pending.iter_mut().enumerate() {
                        if let Some(y) = sample.channel(channel) {
                            points.push(DataPoint::new(x, y));
                        }
                    }
                    self.stats.samples_decoded += 1;
                }
                Err(e) => self.report_malformed(&e),
            }
        }

        let rollover = self.store.rollover();
        for (channel, points) in pending.iter().enumerate() {
            if points.is_empty() {
                continue;
            }
            if let Err(e) = self.store.stream_points(channel, points) {
                tracing::error!("Failed to stream channel {}: {}", channel, e);
                continue;
            }
            // A stale trace gets the whole buffer on the next resync
            if !self.stale[channel] && !self.surface.stream(channel, points, rollover) {
                self.stale[channel] = true;
            }
        }
    }

    /// Send the full buffer of every stale channel as a replacement trace
    fn resync_surface(&mut self) {
        for channel in 0..self.stale.len() {
            if !self.stale[channel] {
                continue;
            }
            let Some(points) = self.store.snapshot(channel) else {
                continue;
            };
            let max_len = points.len().max(self.store.rollover());
            if self.surface.replace(channel, &points, max_len) {
                tracing::debug!("Resent {} points to channel {}", points.len(), channel);
                self.stale[channel] = false;
            }
        }
    }

    /// Read up to and including one `stop`, then apply the frame
    fn capture_burst(&mut self) {
        while let Some(line) = self.read_or_report() {
            match self.framer.push(line) {
                Framing::Complete(lines) => {
                    self.apply_batch(&lines);
                    // Anything after `stop` belongs to the next tick
                    return;
                }
                Framing::Started { restarted: true } => {
                    tracing::debug!("Burst frame restarted before stop");
                }
                Framing::Started { .. } | Framing::Buffered | Framing::Skipped => {}
            }
        }

        if self.framer.is_active() {
            let dropped = self.framer.discard_partial();
            self.stats.batches_discarded += 1;
            self.events.advise(
                AdvisoryKind::BatchDiscarded,
                &ScopeError::IncompleteFrame(dropped),
            );
        }
    }

    /// Decode a completed frame and replace every channel with it
    fn apply_batch(&mut self, lines: &[String]) {
        let channels = self.store.channel_count();
        let (samples, rejected) = decode_batch(lines, channels);
        for e in &rejected {
            self.report_malformed(e);
        }

        if samples.is_empty() {
            self.events.advise(
                AdvisoryKind::EmptyBatch,
                &ScopeError::EmptyFrame(lines.len()),
            );
            return;
        }

        let count = samples.len();
        for (channel, column) in Sample::columns(&samples, channels).iter().enumerate() {
            let points: Vec<DataPoint> = column
                .iter()
                .enumerate()
                .map(|(i, &y)| DataPoint::new(i as f64, y))
                .collect();

            if let Err(e) = self.store.replace(channel, &points, count) {
                tracing::error!("Failed to replace channel {}: {}", channel, e);
                continue;
            }
            self.stale[channel] = !self.surface.replace(channel, &points, count);
        }

        self.stats.samples_decoded += count as u64;
        self.stats.batches_completed += 1;
        self.events.emit(EngineEvent::BatchCaptured { samples: count });
        tracing::trace!("Burst frame applied: {} samples", count);
    }

    fn clear_data(&mut self) {
        self.store.clear();
        self.framer.reset();
        self.start = Instant::now();

        let rollover = self.store.rollover();
        for channel in 0..self.store.channel_count() {
            self.stale[channel] = !self.surface.replace(channel, &[], rollover);
        }
        tracing::info!("Cleared acquisition data");
    }

    /// Publish a state change seen since the last tick
    fn publish_state(&mut self) {
        let state = self.state();
        if state != self.last_state {
            tracing::info!("Engine state {} -> {}", self.last_state, state);
            self.last_state = state;
            self.events.emit(EngineEvent::StateChanged(state));
        }
    }

    /// Rate limit the tick loop
    fn rate_limit(&mut self) {
        let target_interval = self.config.tick_interval();
        if target_interval.is_zero() {
            std::thread::yield_now();
            return;
        }

        let elapsed = self.last_tick_time.elapsed();
        if elapsed < target_interval {
            std::thread::sleep(target_interval - elapsed);
        }

        self.last_tick_time = Instant::now();
    }

    /// Publish statistics (dropped if the event queue is full)
    fn send_stats(&mut self) {
        self.events.emit(EngineEvent::Stats(self.stats()));
    }

    /// Current statistics
    pub fn stats(&self) -> AcquisitionStats {
        let mut stats = self.stats.clone();
        stats.dropped_events = self.events.dropped();
        stats
    }

    /// Current acquisition state
    pub fn state(&self) -> EngineState {
        match transport::lock(&self.transport) {
            Ok(t) if t.is_open() => EngineState::acquiring(self.config.mode),
            _ => EngineState::Idle,
        }
    }

    /// The engine's data store
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Active y-axis bounds
    pub fn vertical_range(&self) -> VerticalRange {
        self.vertical_range
    }

    /// Active rollover bound
    pub fn rollover(&self) -> usize {
        self.store.rollover()
    }

    /// Capture mode
    pub fn mode(&self) -> CaptureMode {
        self.config.mode
    }

    /// Elapsed time since the x origin
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get a handle to stop the engine
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
