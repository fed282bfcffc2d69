//! Mock Transport Implementation for Testing
//!
//! A scripted stand-in for the scope device. The [`MockTransport`] is what
//! the engine owns; the paired [`MockDevice`] is the "far end" a test keeps
//! to feed lines in and inspect what the host wrote.
//!
//! # Features
//!
//! - **Scripted input**: queue whole lines or raw byte fragments
//! - **Fault injection**: refuse to open, or drop the connection after N lines
//! - **Write capture**: every byte the host writes is recorded
//! - **Generator emulation**: `generate` commands written by the host select a
//!   waveform that [`MockDevice::emit_samples`] turns into sample lines
//!
//! # Example
//!
//! ```ignore
//! use serialscope_rs::transport::{MockTransport, Transport};
//!
//! let mut transport = MockTransport::new(2);
//! let device = transport.device();
//!
//! transport.set_port(Some("mock0".to_string()));
//! transport.open()?;
//! device.push_line("1.0,2.0");
//! assert_eq!(transport.read_line()?, Some("1.0,2.0".to_string()));
//! ```

use super::{LineBuffer, Transport, TransportStats, DEFAULT_BAUD_RATE};
use crate::error::{Result, ScopeError};
use crate::generator::{GeneratorCommand, Waveform};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default spacing between emitted samples (100 kS/s)
pub const DEFAULT_SAMPLE_PERIOD: f64 = 1e-5;

/// Length of one frequency sweep in seconds
const SWEEP_PERIOD: f64 = 1.0;

#[derive(Debug)]
struct DeviceState {
    /// Bytes the device has sent that the host has not read yet
    incoming: VecDeque<u8>,
    /// Everything the host wrote
    written: Vec<u8>,
    /// Partial command line written by the host
    command_tail: LineBuffer,
    fail_open: bool,
    close_after_reads: Option<usize>,
    generators: BTreeMap<u32, GeneratorCommand>,
    channels: usize,
    sample_period: f64,
    sample_clock: u64,
}

/// The device side of a [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    fn new(channels: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                incoming: VecDeque::new(),
                written: Vec::new(),
                command_tail: LineBuffer::new(),
                fail_open: false,
                close_after_reads: None,
                generators: BTreeMap::new(),
                channels,
                sample_period: DEFAULT_SAMPLE_PERIOD,
                sample_clock: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        // A panicking test thread must not wedge the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one line (a `\n` is appended)
    pub fn push_line(&self, line: &str) {
        let mut state = self.state();
        state.incoming.extend(line.as_bytes());
        state.incoming.push_back(b'\n');
    }

    /// Queue several lines
    pub fn push_lines<S: AsRef<str>>(&self, lines: &[S]) {
        for line in lines {
            self.push_line(line.as_ref());
        }
    }

    /// Queue raw bytes, e.g. half a line
    pub fn push_raw(&self, bytes: &[u8]) {
        self.state().incoming.extend(bytes);
    }

    /// Bytes not yet read by the host
    pub fn pending_bytes(&self) -> usize {
        self.state().incoming.len()
    }

    /// Make every following open attempt fail
    pub fn set_fail_open(&self, fail: bool) {
        self.state().fail_open = fail;
    }

    /// Drop the connection after the host has read `lines` more lines
    pub fn close_after_reads(&self, lines: usize) {
        self.state().close_after_reads = Some(lines);
    }

    /// Everything the host wrote so far
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    /// Host writes split into lines
    pub fn written_lines(&self) -> Vec<String> {
        let mut buffer = LineBuffer::new();
        buffer.extend(&self.written());
        std::iter::from_fn(|| buffer.next_line()).collect()
    }

    /// Generator configuration last written for a channel
    pub fn generator(&self, channel: u32) -> Option<GeneratorCommand> {
        self.state().generators.get(&channel).copied()
    }

    /// Change the spacing between emitted samples
    pub fn set_sample_period(&self, seconds: f64) {
        self.state().sample_period = seconds;
    }

    /// Emit `count` sample lines from the configured generators.
    ///
    /// Channels without a generator read 0.
    pub fn emit_samples(&self, count: usize) {
        let mut state = self.state();
        for _ in 0..count {
            let t = state.sample_clock as f64 * state.sample_period;
            state.sample_clock += 1;

            let line = (1..=state.channels as u32)
                .map(|channel| {
                    let value = state
                        .generators
                        .get(&channel)
                        .map(|cmd| generate_value(cmd, t))
                        .unwrap_or(0.0);
                    format!("{:.6}", value)
                })
                .collect::<Vec<_>>()
                .join(",");

            state.incoming.extend(line.as_bytes());
            state.incoming.push_back(b'\n');
        }
    }

    /// Emit one burst frame of `count` samples between `start` and `stop`
    pub fn emit_frame(&self, count: usize) {
        self.push_line(crate::decoder::START_MARKER);
        self.emit_samples(count);
        self.push_line(crate::decoder::STOP_MARKER);
    }

    fn receive(&self, data: &[u8]) {
        let mut state = self.state();
        state.written.extend_from_slice(data);
        state.command_tail.extend(data);
        while let Some(line) = state.command_tail.next_line() {
            match line.parse::<GeneratorCommand>() {
                Ok(cmd) => {
                    tracing::debug!("Mock device generator {}: {:?}", cmd.channel, cmd);
                    state.generators.insert(cmd.channel, cmd);
                }
                Err(e) => tracing::debug!("Mock device ignored command: {}", e),
            }
        }
    }
}

/// Value of a generator output at time `t` seconds
fn generate_value(cmd: &GeneratorCommand, t: f64) -> f64 {
    let peak = cmd.amplitude / 2.0;
    let phase = (cmd.frequency * t).fract();

    match cmd.waveform {
        Waveform::Sine => peak * (2.0 * std::f64::consts::PI * cmd.frequency * t).sin(),
        Waveform::Square => {
            if phase < 0.5 {
                peak
            } else {
                -peak
            }
        }
        Waveform::Triangle => {
            if phase < 0.5 {
                peak * (4.0 * phase - 1.0)
            } else {
                peak * (3.0 - 4.0 * phase)
            }
        }
        Waveform::Sweep => {
            // Linear chirp from 0 Hz up to the set frequency, restarting every period
            let tau = t % SWEEP_PERIOD;
            let instantaneous = cmd.frequency * tau / (2.0 * SWEEP_PERIOD);
            peak * (2.0 * std::f64::consts::PI * instantaneous * tau).sin()
        }
        Waveform::Dc => peak,
    }
}

/// Transport half of the mock, owned by the engine
#[derive(Debug)]
pub struct MockTransport {
    port: Option<String>,
    baud_rate: u32,
    open: bool,
    reads_since_open: usize,
    lines: LineBuffer,
    device: MockDevice,
    stats: TransportStats,
}

impl MockTransport {
    /// Create a closed mock for a device with `channels` outputs
    pub fn new(channels: usize) -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            open: false,
            reads_since_open: 0,
            lines: LineBuffer::new(),
            device: MockDevice::new(channels),
            stats: TransportStats::default(),
        }
    }

    /// Handle to the device end
    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(ScopeError::NotOpen(operation.to_string()))
        }
    }
}

impl Transport for MockTransport {
    fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    fn set_port(&mut self, port: Option<String>) {
        self.port = port;
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        let name = self.port.clone().ok_or(ScopeError::NoPortSelected)?;

        if self.device.state().fail_open {
            self.stats.open_failures += 1;
            return Err(ScopeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("mock port {} unavailable", name),
            )));
        }

        self.open = true;
        self.reads_since_open = 0;
        self.lines.clear();
        self.stats.opens += 1;
        tracing::debug!("Mock transport opened {} at {} baud", name, self.baud_rate);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.lines.clear();
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.ensure_open("poll")?;
        Ok(self.device.pending_bytes() + self.lines.len())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        self.ensure_open("read")?;

        {
            let mut state = self.device.state();
            let bytes: Vec<u8> = state.incoming.drain(..).collect();
            self.stats.bytes_read += bytes.len() as u64;
            self.lines.extend(&bytes);
        }

        let line = self.lines.next_line();
        if line.is_some() {
            self.stats.lines_read += 1;
            self.reads_since_open += 1;

            let limit = self.device.state().close_after_reads;
            if limit.is_some_and(|n| self.reads_since_open >= n) {
                tracing::debug!("Mock transport dropping connection after {} lines", self.reads_since_open);
                self.device.state().close_after_reads = None;
                self.close();
            }
        }
        Ok(line)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open("write")?;
        self.device.receive(data);
        self.stats.bytes_written += data.len() as u64;
        Ok(())
    }

    fn stats(&self) -> &TransportStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut TransportStats {
        &mut self.stats
    }
}
