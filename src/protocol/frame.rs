//! Line framing for the photodiode rig.
//!
//! Wire format (one newline-terminated ASCII line each):
//!
//! ```text
//! START
//! 1.23,0.045;1.24,0.046;1.25,0.047
//! STOP
//! ```
//!
//! A sentinel line is matched exactly and never split. Any other line is a `;`-separated list
//! of `voltage,current` pairs; each pair is parsed independently so one corrupt pair does not
//! take the rest of the line down with it.

use crate::measurement_types::{ControlToken, Reading};
use thiserror::Error;

/// Field delimiter between readings on one line.
pub const SEGMENT_DELIMITER: char = ';';
/// Separator between voltage and current within a segment.
pub const PAIR_SEPARATOR: char = ',';

/// Why one `voltage,current` segment was dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// No `,` in the segment
    #[error("segment '{segment}' has no ',' separator")]
    MissingSeparator {
        /// Offending segment text
        segment: String,
    },

    /// Voltage half did not parse as a decimal number
    #[error("invalid voltage '{value}' in segment '{segment}'")]
    InvalidVoltage {
        /// Offending segment text
        segment: String,
        /// Voltage substring
        value: String,
    },

    /// Current half did not parse as a decimal number
    #[error("invalid current '{value}' in segment '{segment}'")]
    InvalidCurrent {
        /// Offending segment text
        segment: String,
        /// Current substring
        value: String,
    },

    /// Parsed, but NaN or infinite
    #[error("non-finite value in segment '{segment}'")]
    NonFinite {
        /// Offending segment text
        segment: String,
    },
}

/// Result of parsing one decoded line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `START` or `STOP`
    Control(ControlToken),
    /// Per-segment outcomes in left-to-right order. May be empty.
    Data(Vec<Result<Reading, SegmentError>>),
}

impl Frame {
    /// Control token carried by this frame, if any.
    pub fn control(&self) -> Option<ControlToken> {
        match self {
            Frame::Control(token) => Some(*token),
            Frame::Data(_) => None,
        }
    }

    /// Successfully parsed readings, in order.
    pub fn readings(&self) -> impl Iterator<Item = Reading> + '_ {
        let segments: &[Result<Reading, SegmentError>] = match self {
            Frame::Control(_) => &[],
            Frame::Data(segments) => segments,
        };
        segments.iter().filter_map(|s| s.as_ref().ok().copied())
    }

    /// Segments that were dropped, in order.
    pub fn failures(&self) -> impl Iterator<Item = &SegmentError> + '_ {
        let segments: &[Result<Reading, SegmentError>] = match self {
            Frame::Control(_) => &[],
            Frame::Data(segments) => segments,
        };
        segments.iter().filter_map(|s| s.as_ref().err())
    }
}

/// Parse one decoded line.
///
/// Leading/trailing whitespace (including a stray `\r`) is ignored. Empty segments are
/// skipped without being reported.
pub fn parse_line(line: &str) -> Frame {
    let line = line.trim();

    if let Some(token) = ControlToken::from_line(line) {
        return Frame::Control(token);
    }

    let segments = line
        .split(SEGMENT_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_segment)
        .collect();

    Frame::Data(segments)
}

/// Parse a single `voltage,current` segment.
pub fn parse_segment(segment: &str) -> Result<Reading, SegmentError> {
    let (voltage, current) =
        segment
            .split_once(PAIR_SEPARATOR)
            .ok_or_else(|| SegmentError::MissingSeparator {
                segment: segment.to_string(),
            })?;

    let voltage = voltage.trim();
    let current = current.trim();

    let v: f64 = voltage.parse().map_err(|_| SegmentError::InvalidVoltage {
        segment: segment.to_string(),
        value: voltage.to_string(),
    })?;
    let i: f64 = current.parse().map_err(|_| SegmentError::InvalidCurrent {
        segment: segment.to_string(),
        value: current.to_string(),
    })?;

    if !v.is_finite() || !i.is_finite() {
        return Err(SegmentError::NonFinite {
            segment: segment.to_string(),
        });
    }

    Ok(Reading::new(v, i))
}
