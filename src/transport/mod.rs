//! Serial transport abstraction
//!
//! The engine never talks to `serialport` directly. It goes through the
//! [`Transport`] trait so that the same acquisition code runs against real
//! hardware ([`SerialTransport`]) and against a scripted device in tests
//! ([`MockTransport`]).
//!
//! # Sharing
//!
//! The transport is shared between the acquisition tick and the control
//! panel (port and baud changes reopen it synchronously on the caller's
//! thread). [`SharedTransport`] wraps it in a mutex; the tick takes the lock
//! once per line so a close from another thread can land between two reads.

pub mod mock;
pub mod serial;

pub use mock::{MockDevice, MockTransport};
pub use serial::{filter_device_ports, list_available_ports, SerialTransport, PLACEHOLDER_PORT_PREFIX};

use crate::error::{Result, ScopeError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Port identifier meaning "no device selected"
pub const NO_PORT: &str = "None";

/// Default baud rate of the device firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Interpret a port identifier from the control panel.
///
/// `"none"` in any letter case, or an empty string, means no port.
pub fn parse_port_selection(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() || id.eq_ignore_ascii_case(NO_PORT) {
        None
    } else {
        Some(id.to_string())
    }
}

/// Statistics for transport operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportStats {
    /// Complete lines handed to the caller
    pub lines_read: u64,
    /// Raw bytes pulled from the device
    pub bytes_read: u64,
    /// Raw bytes written to the device
    pub bytes_written: u64,
    /// Failed read attempts
    pub read_errors: u64,
    /// Failed open attempts
    pub open_failures: u64,
    /// Successful opens
    pub opens: u64,
}

impl TransportStats {
    /// Record a line handed out
    pub fn record_line(&mut self, bytes: usize) {
        self.lines_read += 1;
        self.bytes_read += bytes as u64;
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Unified interface for the device connection
///
/// Implementations must be `Send` so the transport can be shared between the
/// acquisition thread and the control panel.
pub trait Transport: Send {
    /// Currently selected port, if any
    fn port(&self) -> Option<&str>;

    /// Select a port. Takes effect on the next [`Transport::open`].
    fn set_port(&mut self, port: Option<String>);

    /// Currently configured baud rate
    fn baud_rate(&self) -> u32;

    /// Set the baud rate. Takes effect on the next [`Transport::open`].
    fn set_baud_rate(&mut self, baud_rate: u32);

    /// Open the selected port
    fn open(&mut self) -> Result<()>;

    /// Close the port. Closing a closed transport does nothing.
    fn close(&mut self);

    /// Check if the port is open
    fn is_open(&self) -> bool;

    /// Number of bytes ready to read without blocking
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read one complete line without its terminator.
    ///
    /// Returns `Ok(None)` when no complete line is available yet; a partial
    /// line stays buffered until the rest of it arrives.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Write raw bytes to the device
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Get transport statistics
    fn stats(&self) -> &TransportStats;

    /// Get mutable reference to transport statistics
    fn stats_mut(&mut self) -> &mut TransportStats;

    /// Reset transport statistics
    fn reset_stats(&mut self) {
        self.stats_mut().reset();
    }
}

/// Transport shared between the acquisition tick and the control panel
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Wrap a transport for sharing
pub fn share<T: Transport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}

/// Lock a shared transport
pub fn lock(transport: &SharedTransport) -> Result<MutexGuard<'_, Box<dyn Transport>>> {
    transport.lock().map_err(|_| ScopeError::LockPoisoned)
}

/// Accumulates raw bytes and splits them into `\n`-terminated lines
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// True when a complete line is buffered
    pub fn has_line(&self) -> bool {
        self.pending.contains(&b'\n')
    }

    /// Take the next complete line, without `\n` or `\r\n`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the decoder then
    /// reports the line as malformed.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let text = String::from_utf8_lossy(&raw[..end]);
        Some(text.trim_end_matches('\r').to_string())
    }

    /// Bytes buffered, complete lines and partial tail together
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
