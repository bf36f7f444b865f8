//! Line-oriented transports.
//!
//! The acquisition runner only needs two operations from the wire: a cheap check for pending
//! bytes and a read of one decoded line. Implementations:
//!
//! - [`SerialTransport`] (feature `instrument_serial`): RS-232 / USB-serial / Bluetooth SPP
//!   via the `serialport` crate
//! - [`ScriptedTransport`]: replays a fixed list of lines and failures (tests)
//! - [`SimulatedRig`]: synthesizes a photodiode sweep (offline runs)
//!
//! # Error contract
//!
//! - [`DaqError::Read`] / [`DaqError::Decode`]: this line is lost, keep polling
//! - [`DaqError::TransportLost`]: stop polling and surface to the caller
//!
//! [`DaqError::Read`]: crate::error::DaqError::Read
//! [`DaqError::Decode`]: crate::error::DaqError::Decode
//! [`DaqError::TransportLost`]: crate::error::DaqError::TransportLost

pub mod scripted;
#[cfg(feature = "instrument_serial")]
pub mod serial;
pub mod simulated;

pub use scripted::{ScriptedEvent, ScriptedTransport};
#[cfg(feature = "instrument_serial")]
pub use serial::{list_ports, PortSummary, SerialTransport};
pub use simulated::{SimulatedRig, SimulationConfig};

use crate::error::AppResult;

/// A source of newline-terminated text lines.
pub trait LineTransport: Send {
    /// Number of bytes ready to be read without blocking. Nonzero means `read_line` will not
    /// wait on the device.
    fn bytes_available(&mut self) -> AppResult<usize>;

    /// Read one line with the terminator stripped.
    fn read_line(&mut self) -> AppResult<String>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn bytes_available(&mut self) -> AppResult<usize> {
        (**self).bytes_available()
    }

    fn read_line(&mut self) -> AppResult<String> {
        (**self).read_line()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Accumulates raw bytes and hands out complete `\n`-terminated lines.
///
/// A line that has not seen its terminator yet stays buffered, so a reader can report "nothing
/// to read" instead of waiting on the rest of it.
#[cfg_attr(not(feature = "instrument_serial"), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

#[cfg_attr(not(feature = "instrument_serial"), allow(dead_code))]
impl LineBuffer {
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Length of the first complete line including its terminator, or 0.
    pub(crate) fn complete_len(&self) -> usize {
        self.bytes
            .iter()
            .position(|&b| b == b'\n')
            .map_or(0, |i| i + 1)
    }

    /// Remove and decode the first complete line.
    pub(crate) fn take_line(&mut self) -> Option<AppResult<String>> {
        match self.complete_len() {
            0 => None,
            len => Some(decode_line(self.bytes.drain(..len).collect())),
        }
    }
}

/// Strip a trailing `\n` or `\r\n` and decode as UTF-8.
pub(crate) fn decode_line(mut bytes: Vec<u8>) -> AppResult<String> {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| crate::error::DaqError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaqError;

    #[test]
    fn decode_strips_terminators() {
        assert_eq!(decode_line(b"START\r\n".to_vec()).unwrap(), "START");
        assert_eq!(decode_line(b"1.0,0.1\n".to_vec()).unwrap(), "1.0,0.1");
        assert_eq!(decode_line(b"STOP".to_vec()).unwrap(), "STOP");
    }

    #[test]
    fn partial_line_is_not_available() {
        let mut buffer = LineBuffer::default();
        buffer.extend(b"1.23,0.045;");
        assert_eq!(buffer.complete_len(), 0);
        assert!(buffer.take_line().is_none());

        buffer.extend(b"1.24,0.046\r\nSTA");
        assert_eq!(buffer.complete_len(), 23);
        assert_eq!(buffer.take_line().unwrap().unwrap(), "1.23,0.045;1.24,0.046");
        assert!(buffer.take_line().is_none());

        buffer.extend(b"RT\n");
        assert_eq!(buffer.take_line().unwrap().unwrap(), "START");
    }

    #[test]
    fn invalid_line_is_consumed() {
        let mut buffer = LineBuffer::default();
        buffer.extend(&[0xff, b'\n']);
        buffer.extend(b"STOP\n");
        assert!(matches!(buffer.take_line(), Some(Err(DaqError::Decode(_)))));
        assert_eq!(buffer.take_line().unwrap().unwrap(), "STOP");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(matches!(
            decode_line(vec![0xff, 0xfe, b'\n']),
            Err(DaqError::Decode(_))
        ));
    }
}
