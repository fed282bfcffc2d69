//! Acquisition engine
//!
//! The engine reads lines from the transport, decodes them, updates the
//! rolling store and pushes the new points to a render surface, once per
//! scheduler tick. It runs on a single thread and owns the data store.
//!
//! # Architecture
//!
//! - [`AcquisitionEngine`] - The tick loop. Owns the store and the surface.
//! - [`EngineHandle`] - Control panel side. Cloneable, usable from any thread.
//! - [`EngineCommand`] - Queued configuration changes, applied at the start
//!   of the next tick
//! - [`EngineEvent`] - State changes, advisories and statistics sent back
//!
//! Port and baud rate changes do not go through the queue. They reopen the
//! shared transport synchronously on the caller's thread so the caller learns
//! straight away whether the port opened. The tick takes the transport lock
//! once per line and re-checks `is_open` before every read, so a close landing
//! between two reads simply ends that tick's drain.
//!
//! # Example
//!
//! ```ignore
//! use serialscope_rs::config::AppConfig;
//! use serialscope_rs::engine::AcquisitionEngine;
//! use serialscope_rs::surface::NullSurface;
//! use serialscope_rs::transport::{share, SerialTransport};
//!
//! let config = AppConfig::default();
//! let transport = share(SerialTransport::default());
//! let (mut engine, handle) = AcquisitionEngine::new(&config, transport, Box::new(NullSurface));
//!
//! std::thread::spawn(move || engine.run());
//!
//! handle.select_port("/dev/ttyACM0")?;
//! handle.set_vertical_range(0.0, 3.5)?;
//!
//! for event in handle.drain() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod acquisition;
pub mod burst;

pub use acquisition::AcquisitionEngine;
pub use burst::{BurstFramer, Framing};

use crate::error::{Result, ScopeError};
use crate::generator::{GeneratorCommand, GeneratorSettings, Waveform};
use crate::transport::{self, parse_port_selection, SharedTransport, DEFAULT_BAUD_RATE};
use crate::types::{AcquisitionStats, CaptureMode, EngineState, VerticalRange};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration change queued for the next tick
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Change the rollover bound (already validated)
    SetRollover(usize),
    /// Change the y-axis bounds (already validated)
    SetVerticalRange(VerticalRange),
    /// Empty every channel and restart the time origin
    ClearData,
    /// Publish statistics now
    RequestStats,
    /// Stop the scheduler loop
    Shutdown,
}

/// Category of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryKind {
    /// A line did not decode and was dropped
    MalformedSample,
    /// The transport failed to open
    OpenFailed,
    /// A configuration request was rejected
    InvalidConfig,
    /// An operation needed an open transport
    NotOpen,
    /// Reading from the transport failed
    ReadFailed,
    /// Writing to the transport failed
    WriteFailed,
    /// A burst frame was cut off before `stop`
    BatchDiscarded,
    /// A burst frame held no decodable samples
    EmptyBatch,
}

impl AdvisoryKind {
    /// Advisories worth an operator's attention; the rest are per-line noise
    pub fn is_operator_visible(&self) -> bool {
        !matches!(
            self,
            AdvisoryKind::MalformedSample | AdvisoryKind::BatchDiscarded | AdvisoryKind::EmptyBatch
        )
    }
}

/// A reported, non-fatal problem
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    /// Category
    pub kind: AdvisoryKind,
    /// Human readable description
    pub message: String,
}

/// Message sent from the engine to the control panel
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Acquisition state changed
    StateChanged(EngineState),
    /// Something was dropped, rejected or failed
    Advisory(Advisory),
    /// A burst frame was applied
    BatchCaptured { samples: usize },
    /// Statistics update
    Stats(AcquisitionStats),
    /// The engine loop exited
    Shutdown,
}

/// Event sender shared by the engine and its handles
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    sender: Sender<EngineEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub(crate) fn new(sender: Sender<EngineEvent>) -> Self {
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send without blocking; a full queue drops the event
    pub(crate) fn emit(&self, event: EngineEvent) {
        if self.sender.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Log and publish an advisory
    pub(crate) fn advise(&self, kind: AdvisoryKind, error: &ScopeError) {
        if kind.is_operator_visible() {
            tracing::warn!("{:?}: {}", kind, error);
        } else {
            tracing::debug!("{:?}: {}", kind, error);
        }
        self.emit(EngineEvent::Advisory(Advisory {
            kind,
            message: error.to_string(),
        }));
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Control panel side of the engine
#[derive(Clone)]
pub struct EngineHandle {
    command_sender: Sender<EngineCommand>,
    event_receiver: Receiver<EngineEvent>,
    events: EventSink,
    transport: SharedTransport,
    mode: CaptureMode,
}

impl EngineHandle {
    pub(crate) fn new(
        command_sender: Sender<EngineCommand>,
        event_receiver: Receiver<EngineEvent>,
        events: EventSink,
        transport: SharedTransport,
        mode: CaptureMode,
    ) -> Self {
        Self {
            command_sender,
            event_receiver,
            events,
            transport,
            mode,
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn queue(&self, cmd: EngineCommand) -> Result<()> {
        self.command_sender
            .send(cmd)
            .map_err(|e| ScopeError::Channel(format!("engine stopped, {:?} not delivered", e.0)))
    }

    fn reject(&self, error: ScopeError) -> ScopeError {
        self.events.advise(AdvisoryKind::InvalidConfig, &error);
        error
    }

    /// Current acquisition state
    pub fn state(&self) -> EngineState {
        match transport::lock(&self.transport) {
            Ok(t) if t.is_open() => EngineState::acquiring(self.mode),
            _ => EngineState::Idle,
        }
    }

    /// Capture mode fixed at construction
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Currently selected port
    pub fn port(&self) -> Option<String> {
        transport::lock(&self.transport)
            .ok()
            .and_then(|t| t.port().map(String::from))
    }

    /// Currently configured baud rate
    pub fn baud_rate(&self) -> u32 {
        transport::lock(&self.transport)
            .map(|t| t.baud_rate())
            .unwrap_or(DEFAULT_BAUD_RATE)
    }

    /// Select a port and open it.
    ///
    /// `"none"` (any case) closes the transport and leaves the engine idle.
    /// An open failure is reported and leaves the engine idle.
    pub fn select_port(&self, id: &str) -> Result<EngineState> {
        let selection = parse_port_selection(id);
        let mut transport = transport::lock(&self.transport)?;

        if transport.is_open() {
            transport.close();
        }
        transport.set_port(selection.clone());

        let Some(name) = selection else {
            tracing::info!("Port deselected");
            return Ok(EngineState::Idle);
        };

        match transport.open() {
            Ok(()) => {
                tracing::info!("Selected port {}", name);
                Ok(EngineState::acquiring(self.mode))
            }
            Err(e) => {
                self.events.advise(AdvisoryKind::OpenFailed, &e);
                Err(e)
            }
        }
    }

    /// Change the baud rate, reopening the port if one is selected.
    ///
    /// With no port selected the rate is stored for the next open.
    pub fn set_baud_rate(&self, baud_rate: u32) -> Result<EngineState> {
        if baud_rate == 0 {
            return Err(self.reject(ScopeError::InvalidBaudRate(baud_rate)));
        }

        let mut transport = transport::lock(&self.transport)?;
        if transport.is_open() {
            transport.close();
        }
        transport.set_baud_rate(baud_rate);

        if transport.port().is_none() {
            tracing::debug!("Baud rate set to {} (no port selected)", baud_rate);
            return Ok(EngineState::Idle);
        }

        match transport.open() {
            Ok(()) => {
                tracing::info!("Baud rate set to {}", baud_rate);
                Ok(EngineState::acquiring(self.mode))
            }
            Err(e) => {
                self.events.advise(AdvisoryKind::OpenFailed, &e);
                Err(e)
            }
        }
    }

    /// Change the number of points kept per channel
    pub fn set_rollover(&self, rollover: usize) -> Result<()> {
        if rollover < 1 {
            return Err(self.reject(ScopeError::InvalidRollover(rollover)));
        }
        self.queue(EngineCommand::SetRollover(rollover))
    }

    /// Change the y-axis bounds; rejected unless `min < max`
    pub fn set_vertical_range(&self, min: f64, max: f64) -> Result<()> {
        let range = VerticalRange::new(min, max).map_err(|e| self.reject(e))?;
        self.queue(EngineCommand::SetVerticalRange(range))
    }

    /// Send a `generate` command to the device.
    ///
    /// The device does not acknowledge, so success only means the bytes were
    /// written.
    pub fn write_generator_command(
        &self,
        channel: u32,
        amplitude: f64,
        frequency: f64,
        waveform: Waveform,
    ) -> Result<()> {
        let cmd = GeneratorCommand::new(channel, amplitude, frequency, waveform)
            .map_err(|e| self.reject(e))?;
        self.write_generator(&cmd)
    }

    /// Send an already built `generate` command
    pub fn write_generator(&self, cmd: &GeneratorCommand) -> Result<()> {
        let mut transport = transport::lock(&self.transport)?;
        if !transport.is_open() {
            let e = ScopeError::NotOpen("generator command".to_string());
            self.events.advise(AdvisoryKind::NotOpen, &e);
            return Err(e);
        }

        let line = cmd.to_line();
        transport.write(line.as_bytes()).map_err(|e| {
            self.events.advise(AdvisoryKind::WriteFailed, &e);
            e
        })?;
        tracing::debug!("Sent {}", line.trim_end());
        Ok(())
    }

    /// Send one `generate` command per entry, entry 0 going to channel 1.
    /// Returns how many were written.
    pub fn apply_generator_settings(&self, settings: &[GeneratorSettings]) -> Result<usize> {
        for (i, entry) in settings.iter().enumerate() {
            let cmd = entry.command(i as u32 + 1).map_err(|e| self.reject(e))?;
            self.write_generator(&cmd)?;
        }
        Ok(settings.len())
    }

    /// List ports the device could be on; safe while a port is open
    pub fn list_available_ports(&self) -> Result<Vec<String>> {
        transport::list_available_ports()
    }

    /// Close the port, deselect it and restore the default baud rate
    pub fn reset_defaults(&self) -> Result<EngineState> {
        let mut transport = transport::lock(&self.transport)?;
        transport.close();
        transport.set_port(None);
        transport.set_baud_rate(DEFAULT_BAUD_RATE);
        tracing::info!("Connection reset to defaults");
        Ok(EngineState::Idle)
    }

    /// Empty every channel
    pub fn clear_data(&self) -> Result<()> {
        self.queue(EngineCommand::ClearData)
    }

    /// Ask for a statistics event
    pub fn request_stats(&self) -> Result<()> {
        self.queue(EngineCommand::RequestStats)
    }

    /// Stop the engine loop
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(EngineCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::surface::NullSurface;
    use crate::transport::{share, MockDevice, MockTransport};

    fn create_handle() -> (AcquisitionEngine, EngineHandle, MockDevice) {
        let mock = MockTransport::new(2);
        let device = mock.device();
        let (engine, handle) =
            AcquisitionEngine::new(&AppConfig::default(), share(mock), Box::new(NullSurface));
        (engine, handle, device)
    }

    fn advisories(handle: &EngineHandle) -> Vec<AdvisoryKind> {
        handle
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Advisory(a) => Some(a.kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_select_port() {
        let (_engine, handle, _device) = create_handle();
        assert_eq!(handle.state(), EngineState::Idle);

        assert_eq!(handle.select_port("mock0").unwrap(), EngineState::Continuous);
        assert_eq!(handle.state(), EngineState::Continuous);
        assert_eq!(handle.port().as_deref(), Some("mock0"));

        assert_eq!(handle.select_port("None").unwrap(), EngineState::Idle);
        assert_eq!(handle.state(), EngineState::Idle);
        assert_eq!(handle.port(), None);
    }

    #[test]
    fn test_select_port_open_failure() {
        let (_engine, handle, device) = create_handle();
        device.set_fail_open(true);

        assert!(handle.select_port("mock0").is_err());
        assert_eq!(handle.state(), EngineState::Idle);
        assert_eq!(advisories(&handle), vec![AdvisoryKind::OpenFailed]);
    }

    #[test]
    fn test_baud_rate_without_port() {
        let (_engine, handle, _device) = create_handle();
        assert_eq!(handle.set_baud_rate(9600).unwrap(), EngineState::Idle);
        assert_eq!(handle.baud_rate(), 9600);

        assert!(matches!(
            handle.set_baud_rate(0),
            Err(ScopeError::InvalidBaudRate(0))
        ));
        assert_eq!(handle.baud_rate(), 9600);
    }

    #[test]
    fn test_baud_rate_reopens() {
        let (_engine, handle, device) = create_handle();
        handle.select_port("mock0").unwrap();
        assert_eq!(handle.set_baud_rate(57_600).unwrap(), EngineState::Continuous);

        device.set_fail_open(true);
        assert!(handle.set_baud_rate(9600).is_err());
        assert_eq!(handle.state(), EngineState::Idle);
        assert_eq!(handle.baud_rate(), 9600);
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let (_engine, handle, _device) = create_handle();
        assert!(handle.set_rollover(0).is_err());
        assert!(handle.set_vertical_range(5.0, 2.0).is_err());
        assert!(handle
            .write_generator_command(1, 5.0, 100.0, Waveform::Sine)
            .is_err());
        assert_eq!(
            advisories(&handle),
            vec![
                AdvisoryKind::InvalidConfig,
                AdvisoryKind::InvalidConfig,
                AdvisoryKind::InvalidConfig
            ]
        );
    }

    #[test]
    fn test_generator_write() {
        let (_engine, handle, device) = create_handle();

        assert!(matches!(
            handle.write_generator_command(1, 1.5, 1e4, Waveform::Sine),
            Err(ScopeError::NotOpen(_))
        ));
        assert!(device.written().is_empty());

        handle.select_port("mock0").unwrap();
        handle
            .write_generator_command(2, 1.0, 250.0, Waveform::Triangle)
            .unwrap();
        assert_eq!(device.written_lines(), vec!["generate 2 1.0 250.0 tri"]);
        assert_eq!(device.generator(2).map(|g| g.waveform), Some(Waveform::Triangle));
    }

    #[test]
    fn test_apply_generator_settings() {
        let (_engine, handle, device) = create_handle();
        let mut settings = vec![GeneratorSettings::default(); 2];
        settings[1].waveform = Waveform::Dc;
        settings[1].amplitude = 1.0;

        assert!(handle.apply_generator_settings(&settings).is_err());

        handle.select_port("mock0").unwrap();
        assert_eq!(handle.apply_generator_settings(&settings).unwrap(), 2);
        assert_eq!(
            device.written_lines(),
            vec!["generate 1 1.5 10000.0 sine", "generate 2 1.0 10000.0 dc"]
        );
        assert_eq!(device.generator(2).map(|g| g.waveform), Some(Waveform::Dc));

        settings[0].amplitude = 5.0;
        assert!(matches!(
            handle.apply_generator_settings(&settings),
            Err(ScopeError::InvalidGenerator(_))
        ));
    }

    #[test]
    fn test_reset_defaults() {
        let (_engine, handle, _device) = create_handle();
        handle.set_baud_rate(9600).unwrap();
        handle.select_port("mock0").unwrap();

        assert_eq!(handle.reset_defaults().unwrap(), EngineState::Idle);
        assert_eq!(handle.port(), None);
        assert_eq!(handle.baud_rate(), DEFAULT_BAUD_RATE);
        assert_eq!(handle.state(), EngineState::Idle);
    }

    #[test]
    fn test_queue_fails_after_engine_dropped() {
        let (engine, handle, _device) = create_handle();
        drop(engine);
        assert!(matches!(handle.clear_data(), Err(ScopeError::Channel(_))));
    }

    #[test]
    fn test_advisory_visibility() {
        assert!(AdvisoryKind::OpenFailed.is_operator_visible());
        assert!(!AdvisoryKind::MalformedSample.is_operator_visible());
    }
}
