//! Transport that replays a prepared script of lines and failures.

use super::LineTransport;
use crate::error::{AppResult, DaqError};
use std::collections::VecDeque;

/// One step of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedEvent {
    /// A decoded line
    Line(String),
    /// A recoverable read failure for one line
    ReadError(String),
    /// A line whose bytes are not valid UTF-8
    DecodeError,
    /// The port disappears
    Lost,
}

/// Replays [`ScriptedEvent`]s in order.
///
/// Once the script is exhausted the transport either idles (no bytes available) or reports
/// itself lost, depending on [`ScriptedTransport::lost_when_exhausted`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    events: VecDeque<ScriptedEvent>,
    lost_when_exhausted: bool,
}

impl ScriptedTransport {
    /// Script consisting only of lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_events(lines.into_iter().map(|l| ScriptedEvent::Line(l.into())))
    }

    /// Script from explicit events.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = ScriptedEvent>,
    {
        Self {
            events: events.into_iter().collect(),
            lost_when_exhausted: false,
        }
    }

    /// Report [`DaqError::TransportLost`] after the last event instead of idling.
    pub fn lost_when_exhausted(mut self) -> Self {
        self.lost_when_exhausted = true;
        self
    }

    /// Append one event.
    pub fn push(&mut self, event: ScriptedEvent) {
        self.events.push_back(event);
    }

    /// Events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    fn lost() -> DaqError {
        DaqError::TransportLost("scripted transport closed".to_string())
    }
}

impl LineTransport for ScriptedTransport {
    fn bytes_available(&mut self) -> AppResult<usize> {
        match self.events.front() {
            Some(ScriptedEvent::Lost) => Err(Self::lost()),
            Some(ScriptedEvent::Line(line)) => Ok(line.len() + 1),
            Some(_) => Ok(1),
            None if self.lost_when_exhausted => Err(Self::lost()),
            None => Ok(0),
        }
    }

    fn read_line(&mut self) -> AppResult<String> {
        match self.events.pop_front() {
            Some(ScriptedEvent::Line(line)) => Ok(line),
            Some(ScriptedEvent::ReadError(msg)) => Err(DaqError::Read(msg)),
            Some(ScriptedEvent::DecodeError) => super::decode_line(vec![0xc3, 0x28, b'\n']),
            Some(ScriptedEvent::Lost) => {
                self.events.push_front(ScriptedEvent::Lost);
                Err(Self::lost())
            }
            None if self.lost_when_exhausted => Err(Self::lost()),
            None => Err(DaqError::Read("no data".to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("scripted ({} events pending)", self.events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_lines_then_idles() {
        let mut transport = ScriptedTransport::from_lines(["START", "STOP"]);
        assert!(transport.bytes_available().unwrap() > 0);
        assert_eq!(transport.read_line().unwrap(), "START");
        assert_eq!(transport.read_line().unwrap(), "STOP");
        assert_eq!(transport.bytes_available().unwrap(), 0);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn failures_are_classified() {
        let mut transport = ScriptedTransport::from_events([
            ScriptedEvent::ReadError("timeout".into()),
            ScriptedEvent::DecodeError,
            ScriptedEvent::Lost,
        ]);
        assert!(transport.read_line().unwrap_err().is_recoverable());
        assert!(matches!(transport.read_line(), Err(DaqError::Decode(_))));
        assert!(matches!(
            transport.bytes_available(),
            Err(DaqError::TransportLost(_))
        ));
        // Lost is sticky.
        assert!(matches!(transport.read_line(), Err(DaqError::TransportLost(_))));
        assert!(matches!(transport.read_line(), Err(DaqError::TransportLost(_))));
    }

    #[test]
    fn exhausted_script_can_report_loss() {
        let mut transport = ScriptedTransport::from_lines(["START"]).lost_when_exhausted();
        transport.read_line().unwrap();
        assert!(matches!(
            transport.bytes_available(),
            Err(DaqError::TransportLost(_))
        ));
    }
}
