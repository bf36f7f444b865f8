use planck_daq::protocol::{parse_line, parse_segment, Frame, SegmentError};
use planck_daq::{ControlToken, Reading};

#[test]
fn test_parse_packed_line() {
    let frame = parse_line("1.970,0.0021;1.969,0.0020;1.968,0.0019\n");
    let readings: Vec<Reading> = frame.readings().collect();
    assert_eq!(
        readings,
        vec![
            Reading::new(1.970, 0.0021),
            Reading::new(1.969, 0.0020),
            Reading::new(1.968, 0.0019),
        ]
    );
    assert_eq!(frame.failures().count(), 0);
}

#[test]
fn test_corrupt_segment_keeps_neighbours() {
    let frame = parse_line("2.5,0.1;2.4,0.x;2.3,0.08");
    assert_eq!(frame.readings().count(), 2);
    assert!(matches!(
        frame.failures().next(),
        Some(SegmentError::InvalidCurrent { value, .. }) if value == "0.x"
    ));
}

#[test]
fn test_control_lines() {
    assert_eq!(parse_line("START").control(), Some(ControlToken::Start));
    assert_eq!(parse_line("STOP\r\n").control(), Some(ControlToken::Stop));
    assert_eq!(parse_line("  STOP  ").control(), Some(ControlToken::Stop));
    // Tokens are case-sensitive and never embedded in data.
    assert_eq!(parse_line("stop").control(), None);
    assert_eq!(parse_line("START;1.0,0.1").control(), None);
}

#[test]
fn test_blank_line_is_empty_data() {
    assert_eq!(parse_line(""), Frame::Data(Vec::new()));
    assert_eq!(parse_line(";;"), Frame::Data(Vec::new()));
}

#[test]
fn test_segment_errors() {
    assert!(matches!(
        parse_segment("1.0"),
        Err(SegmentError::MissingSeparator { .. })
    ));
    assert!(matches!(
        parse_segment("abc,1.0"),
        Err(SegmentError::InvalidVoltage { .. })
    ));
    assert!(matches!(
        parse_segment("inf,1.0"),
        Err(SegmentError::NonFinite { .. })
    ));
    assert_eq!(parse_segment(" -0.5 , 2e-3 "), Ok(Reading::new(-0.5, 0.002)));
}
