use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::SerialChannel;

/// Default line speed used by the peer firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default upper bound for a single `try_read_byte` wait.
pub const DEFAULT_POLL_WINDOW: Duration = Duration::from_millis(50);

/// Static configuration for a hardware serial port.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// OS port identifier (`/dev/ttyACM0`, `COM6`, ...).
    pub path: String,
    /// Line speed. Framing is always 8N1 without flow control.
    pub baud_rate: u32,
    /// Read timeout applied to the driver; bounds each `try_read_byte`.
    pub poll_window: Duration,
}

impl PortConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_window: DEFAULT_POLL_WINDOW,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "port path must not be empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::InvalidConfig(
                "baud rate must be greater than zero".to_string(),
            ));
        }
        if self.poll_window.is_zero() {
            return Err(TransportError::InvalidConfig(
                "poll window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serial channel backed by an OS serial port.
pub struct SerialPortChannel {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    baud_rate: u32,
}

impl SerialPortChannel {
    /// Open the port described by `config` (8N1, no flow control).
    pub fn open(config: &PortConfig) -> Result<Self> {
        config.validate()?;

        let port = serialport::new(config.path.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(config.poll_window)
            .open()
            .map_err(|source| TransportError::Open {
                port: config.path.clone(),
                source,
            })?;

        info!(port = %config.path, baud = config.baud_rate, "serial port opened");

        Ok(Self::from_port(port, config.path.clone(), config.baud_rate))
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>, name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: Some(port),
            name: name.into(),
            baud_rate,
        }
    }

    /// The port identifier this channel was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl SerialChannel for SerialPortChannel {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match port.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match port.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        let port = self.port_mut()?;
        let mut byte = [0u8; 1];
        match port.read(&mut byte) {
            Ok(1) => Ok(Some(byte[0])),
            Ok(_) => Ok(None),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) if err.kind() == ErrorKind::BrokenPipe => Err(TransportError::Disconnected),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let port = self.port_mut()?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!(port = %self.name, "serial port closed");
        } else {
            debug!(port = %self.name, "serial port already closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl std::fmt::Debug for SerialPortChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortChannel")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// A serial port visible to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
}

/// Enumerate serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<PortSummary>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|info| {
            let (kind, description) = match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.or(usb.manufacturer);
                    (format!("usb {:04x}:{:04x}", usb.vid, usb.pid), product)
                }
                SerialPortType::PciPort => ("pci".to_string(), None),
                SerialPortType::BluetoothPort => ("bluetooth".to_string(), None),
                SerialPortType::Unknown => ("unknown".to_string(), None),
            };
            PortSummary {
                name: info.port_name,
                kind,
                description,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_empty_path() {
        let result = SerialPortChannel::open(&PortConfig::new("  "));
        assert!(matches!(result, Err(TransportError::InvalidConfig(_))));
    }

    #[test]
    fn open_rejects_zero_baud() {
        let config = PortConfig::new("/dev/ttyACM0").with_baud_rate(0);
        let result = SerialPortChannel::open(&config);
        assert!(matches!(result, Err(TransportError::InvalidConfig(_))));
    }

    #[test]
    #[cfg(unix)]
    fn open_missing_port_reports_path() {
        let config = PortConfig::new("/dev/serialbridge-does-not-exist");
        let err = SerialPortChannel::open(&config).unwrap_err();
        match err {
            TransportError::Open { port, .. } => {
                assert_eq!(port, "/dev/serialbridge-does-not-exist");
            }
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[test]
    fn default_config_uses_firmware_baud() {
        let config = PortConfig::new("COM6");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.poll_window, DEFAULT_POLL_WINDOW);
    }
}
