//! Real serial port transport built on the `serialport` crate

use super::{LineBuffer, Transport, TransportStats, DEFAULT_BAUD_RATE};
use crate::error::{Result, ResultExt, ScopeError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Prefix of on-board UART placeholders that never carry the device
pub const PLACEHOLDER_PORT_PREFIX: &str = "/dev/ttyS";

/// Default read timeout; reads are always preceded by an availability check
/// so this only bounds a read racing a device that stopped mid-line
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Largest chunk pulled from the port in one read call
const READ_CHUNK: usize = 4096;

/// Drop placeholder endpoints and sort the rest
pub fn filter_device_ports<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut ports: Vec<String> = names
        .into_iter()
        .filter(|name| !name.starts_with(PLACEHOLDER_PORT_PREFIX))
        .collect();
    ports.sort();
    ports.dedup();
    ports
}

/// List serial ports the device could be attached to.
///
/// Safe to call at any time, including while one of the listed ports is
/// open.
pub fn list_available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(filter_device_ports(ports.into_iter().map(|p| p.port_name)))
}

/// Serial port wrapper for the scope device (8N1, no flow control)
pub struct SerialTransport {
    port_name: Option<String>,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
    lines: LineBuffer,
    stats: TransportStats,
}

impl SerialTransport {
    /// Create a closed transport
    pub fn new(port_name: Option<String>, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            port: None,
            lines: LineBuffer::new(),
            stats: TransportStats::default(),
        }
    }

    /// Override the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Pull whatever the OS has buffered into the line buffer
    fn fill(&mut self) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ScopeError::NotOpen("read".to_string()))?;

        let waiting = port.bytes_to_read()? as usize;
        if waiting == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; waiting.min(READ_CHUNK)];
        match port.read(&mut chunk) {
            Ok(n) => {
                self.lines.extend(&chunk[..n]);
                self.stats.bytes_read += n as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(()),
            Err(e) => {
                self.stats.read_errors += 1;
                Err(e.into())
            }
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new(None, DEFAULT_BAUD_RATE)
    }
}

impl Transport for SerialTransport {
    fn port(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    fn set_port(&mut self, port: Option<String>) {
        self.port_name = port;
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            tracing::debug!("Serial port already open");
            return Ok(());
        }
        let name = self.port_name.clone().ok_or(ScopeError::NoPortSelected)?;

        let opened = serialport::new(&name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()
            .with_context(|| format!("Failed to open {} at {} baud", name, self.baud_rate));

        match opened {
            Ok(port) => {
                tracing::info!("Opened serial port: {} at {} baud", name, self.baud_rate);
                self.port = Some(port);
                self.lines.clear();
                self.stats.opens += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.open_failures += 1;
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.port_name.as_deref().unwrap_or("?"));
        }
        self.lines.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ScopeError::NotOpen("poll".to_string()))?;
        Ok(port.bytes_to_read()? as usize + self.lines.len())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if !self.lines.has_line() {
            self.fill()?;
        }
        match self.lines.next_line() {
            Some(line) => {
                self.stats.lines_read += 1;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ScopeError::NotOpen("write".to_string()))?;
        port.write_all(data)?;
        port.flush()?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_device_ports() {
        let names = vec![
            "/dev/ttyS0".to_string(),
            "/dev/ttyUSB0".to_string(),
            "/dev/ttyS31".to_string(),
            "/dev/ttyACM0".to_string(),
            "COM3".to_string(),
        ];
        assert_eq!(
            filter_device_ports(names),
            vec!["/dev/ttyACM0", "/dev/ttyUSB0", "COM3"]
        );
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let mut transport = SerialTransport::default();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write(b"x"),
            Err(ScopeError::NotOpen(_))
        ));
        assert!(transport.bytes_available().is_err());
        // Closing a closed port is a no-op
        transport.close();
    }

    #[test]
    fn test_open_without_port() {
        let mut transport = SerialTransport::new(None, 9600);
        assert!(matches!(transport.open(), Err(ScopeError::NoPortSelected)));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut transport = SerialTransport::new(Some("/dev/does-not-exist-42".to_string()), 9600);
        assert!(transport.open().is_err());
        assert!(!transport.is_open());
        assert_eq!(transport.stats().open_failures, 1);
    }

    #[test]
    fn test_list_available_ports_does_not_panic() {
        // May legitimately fail on systems without serial enumeration support
        let _ = list_available_ports();
    }
}
