//! Text protocol spoken by the photodiode rig.

pub mod frame;
pub use frame::{parse_line, parse_segment, Frame, SegmentError};
