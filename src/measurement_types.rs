//! Measurement data types shared by the parser, the session and storage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One photodiode sample: bias voltage and measured photocurrent.
///
/// Readings are produced one per parsed `voltage,current` segment and never change after
/// creation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Bias voltage in volts
    pub voltage: f64,
    /// Photocurrent in device units (the rig reports amps or ADC-scaled volts)
    pub current: f64,
}

impl Reading {
    /// Create a new reading.
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }
}

/// In-band control signal carried on its own line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlToken {
    /// Device begins streaming a sweep
    Start,
    /// Device finished the sweep
    Stop,
}

impl ControlToken {
    /// The literal that represents this token on the wire.
    pub fn literal(self) -> &'static str {
        match self {
            ControlToken::Start => "START",
            ControlToken::Stop => "STOP",
        }
    }

    /// Exact match of a (trimmed) line against the sentinel literals.
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "START" => Some(ControlToken::Start),
            "STOP" => Some(ControlToken::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_token_literals() {
        assert_eq!(ControlToken::from_line("START"), Some(ControlToken::Start));
        assert_eq!(ControlToken::from_line("STOP"), Some(ControlToken::Stop));
        assert_eq!(ControlToken::from_line("start"), None);
        assert_eq!(ControlToken::from_line("STOPPED"), None);
        assert_eq!(ControlToken::Start.to_string(), "START");
    }

    #[test]
    fn reading_serialization() {
        let reading = Reading::new(1.23, 0.045);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"voltage":1.23,"current":0.045}"#);
    }
}
