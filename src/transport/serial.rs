//! Serial port transport.
//!
//! The rig talks plain ASCII at 9600 8N1 by default (HC-05 Bluetooth modules show up as
//! `/dev/rfcomm0`, USB adapters as `/dev/ttyUSB0` or `COM5`).
//!
//! A device that stalls mid-line leaves the partial line buffered; the runner keeps ticking
//! and sees no data until the terminator arrives.

use super::{LineBuffer, LineTransport};
use crate::error::{AppResult, DaqError};
use serde::Serialize;
use serialport::SerialPort;
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Serial connection yielding decoded lines.
///
/// Reads never wait on the device: each call drains only the bytes the OS already holds, and a
/// line is offered once its `\n` has arrived. The port timeout only bounds that drain.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1, no flow control.
    ///
    /// # Errors
    /// [`DaqError::TransportOpen`] if the port cannot be opened.
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> AppResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| DaqError::TransportOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(port = port_name, baud_rate, "serial port opened");

        Ok(Self {
            port_name: port_name.to_string(),
            baud_rate,
            port,
            buffer: LineBuffer::default(),
        })
    }

    fn lost(&self, reason: impl std::fmt::Display) -> DaqError {
        DaqError::TransportLost(format!("{}: {}", self.port_name, reason))
    }

    /// Move whatever the OS has buffered into the line buffer.
    fn drain(&mut self) -> AppResult<()> {
        let pending = self.port.bytes_to_read().map_err(|e| self.lost(e))? as usize;
        if pending == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; pending];
        match self.port.read(&mut chunk) {
            Ok(0) => Err(self.lost("end of stream")),
            Ok(n) => {
                self.buffer.extend(&chunk[..n]);
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(self.lost(e)),
        }
    }
}

impl LineTransport for SerialTransport {
    fn bytes_available(&mut self) -> AppResult<usize> {
        self.drain()?;
        Ok(self.buffer.complete_len())
    }

    fn read_line(&mut self) -> AppResult<String> {
        if self.buffer.complete_len() == 0 {
            self.drain()?;
        }
        self.buffer
            .take_line()
            .unwrap_or_else(|| Err(DaqError::Read(format!("{}: no complete line", self.port_name))))
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.port_name, self.baud_rate)
    }
}

/// Port listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct PortSummary {
    /// OS port name
    pub name: String,
    /// USB / Bluetooth / PCI / Unknown, with USB vendor details when known
    pub kind: String,
}

/// Enumerate serial ports visible to the OS.
pub fn list_ports() -> AppResult<Vec<PortSummary>> {
    let ports = serialport::available_ports().map_err(|e| DaqError::TransportOpen {
        port: "<enumerate>".to_string(),
        reason: e.to_string(),
    })?;

    Ok(ports
        .into_iter()
        .map(|info| {
            let kind = match info.port_type {
                serialport::SerialPortType::UsbPort(usb) => format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product.unwrap_or_default()
                ),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::Unknown => "Unknown".to_string(),
            };
            PortSummary {
                name: info.port_name,
                kind,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_is_transport_open_error() {
        let result = SerialTransport::open(
            "/dev/planck-daq-does-not-exist",
            9600,
            Duration::from_millis(10),
        );
        match result {
            Err(DaqError::TransportOpen { port, .. }) => {
                assert_eq!(port, "/dev/planck-daq-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("opening a missing port succeeded"),
        }
    }
}
