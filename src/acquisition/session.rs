//! Acquisition session state machine.
//!
//! ```text
//!   begin()            START              STOP / duration elapsed
//! ---------> AwaitingStart ------> Collecting -----------------------> Finished
//! ```
//!
//! The session is a plain value. Every transition takes the current time as an argument, so
//! the same sequence of lines and instants always produces the same session. The timer that
//! drives polling lives in [`crate::acquisition::runner`].

use crate::measurement_types::{ControlToken, Reading};
use crate::protocol::{parse_line, Frame};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for the device to send `START`
    AwaitingStart,
    /// Appending readings
    Collecting,
    /// Terminal; no further readings are accepted
    Finished,
}

/// What ended the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishCause {
    /// Device sent `STOP`
    StopToken,
    /// Configured duration elapsed first
    Timeout,
}

/// Effect of feeding one frame (or one timer tick) to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing changed
    Idle,
    /// `START` received; now collecting
    Started,
    /// This many readings were appended
    Appended(usize),
    /// Collection ended
    Finished(FinishCause),
}

/// One acquisition run.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: SessionState,
    readings: Vec<Reading>,
    elapsed: Vec<Duration>,
    started_at: Option<Instant>,
    finish_cause: Option<FinishCause>,
    rejected_segments: usize,
    discarded_lines: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh session waiting for `START`.
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingStart,
            readings: Vec::new(),
            elapsed: Vec::new(),
            started_at: None,
            finish_cause: None,
            rejected_segments: 0,
            discarded_lines: 0,
        }
    }

    /// User-triggered (re)start. Discards everything from the previous run.
    pub fn begin(&mut self) {
        if !self.readings.is_empty() {
            tracing::debug!(
                discarded = self.readings.len(),
                "resetting session, previous readings dropped"
            );
        }
        *self = Self::new();
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Readings in arrival order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Time since `START` for each reading, parallel to [`Session::readings`].
    pub fn elapsed(&self) -> &[Duration] {
        &self.elapsed
    }

    /// Voltage column.
    pub fn voltages(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.voltage).collect()
    }

    /// Current column.
    pub fn currents(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.current).collect()
    }

    /// When `START` was received.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Why the session finished, once it has.
    pub fn finish_cause(&self) -> Option<FinishCause> {
        self.finish_cause
    }

    /// Malformed segments dropped while collecting.
    pub fn rejected_segments(&self) -> usize {
        self.rejected_segments
    }

    /// Lines lost to read or decode errors.
    pub fn discarded_lines(&self) -> usize {
        self.discarded_lines
    }

    /// Whether the session reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// Record a line lost to a transport read or decode error. State is unchanged.
    pub fn note_discarded_line(&mut self) {
        self.discarded_lines += 1;
    }

    /// Finish the session if it has been collecting for `max_duration` or longer.
    pub fn check_timeout(&mut self, now: Instant, max_duration: Duration) -> Step {
        if self.state != SessionState::Collecting {
            return Step::Idle;
        }
        let Some(started) = self.started_at else {
            return Step::Idle;
        };
        if now.saturating_duration_since(started) >= max_duration {
            tracing::info!(
                readings = self.readings.len(),
                duration = ?max_duration,
                "collection timed out"
            );
            return self.finish(FinishCause::Timeout);
        }
        Step::Idle
    }

    /// Feed one parsed frame.
    pub fn apply(&mut self, frame: &Frame, now: Instant, max_duration: Duration) -> Step {
        if let Step::Finished(cause) = self.check_timeout(now, max_duration) {
            return Step::Finished(cause);
        }

        match (self.state, frame) {
            (SessionState::AwaitingStart, Frame::Control(ControlToken::Start)) => {
                self.state = SessionState::Collecting;
                self.started_at = Some(now);
                tracing::info!("START received, collecting");
                Step::Started
            }
            (SessionState::AwaitingStart, Frame::Control(ControlToken::Stop)) => {
                tracing::debug!("STOP before START ignored");
                Step::Idle
            }
            (SessionState::AwaitingStart, Frame::Data(_)) => {
                tracing::trace!("data before START ignored");
                Step::Idle
            }
            (SessionState::Collecting, Frame::Control(ControlToken::Start)) => {
                tracing::warn!("repeated START while collecting ignored");
                Step::Idle
            }
            (SessionState::Collecting, Frame::Control(ControlToken::Stop)) => {
                tracing::info!(readings = self.readings.len(), "STOP received");
                self.finish(FinishCause::StopToken)
            }
            (SessionState::Collecting, Frame::Data(_)) => self.append(frame, now),
            (SessionState::Finished, _) => Step::Idle,
        }
    }

    fn append(&mut self, frame: &Frame, now: Instant) -> Step {
        let offset = self
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();

        for error in frame.failures() {
            self.rejected_segments += 1;
            tracing::warn!(%error, "dropping malformed segment");
        }

        let before = self.readings.len();
        for reading in frame.readings() {
            self.readings.push(reading);
            self.elapsed.push(offset);
        }
        let added = self.readings.len() - before;

        if added == 0 {
            Step::Idle
        } else {
            tracing::trace!(added, total = self.readings.len(), "readings appended");
            Step::Appended(added)
        }
    }

    fn finish(&mut self, cause: FinishCause) -> Step {
        self.state = SessionState::Finished;
        self.finish_cause = Some(cause);
        Step::Finished(cause)
    }
}

/// Pure transition: parse `line` and return the advanced session.
pub fn poll(mut session: Session, line: &str, now: Instant, max_duration: Duration) -> Session {
    let frame = parse_line(line);
    session.apply(&frame, now, max_duration);
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const LIMIT: Duration = Duration::from_secs(10);

    fn feed(session: &mut Session, t0: Instant, lines: &[(u64, &str)]) -> Vec<Step> {
        lines
            .iter()
            .map(|(ms, line)| {
                session.apply(&parse_line(line), t0 + Duration::from_millis(*ms), LIMIT)
            })
            .collect()
    }

    #[test]
    fn start_moves_to_collecting() {
        let t0 = Instant::now();
        let mut session = Session::new();
        let steps = feed(&mut session, t0, &[(0, "1.0,0.1"), (5, "START")]);
        assert_eq!(steps, vec![Step::Idle, Step::Started]);
        assert_eq!(session.state(), SessionState::Collecting);
        assert!(session.readings().is_empty());
        assert_eq!(session.started_at(), Some(t0 + Duration::from_millis(5)));
    }

    #[test]
    fn readings_after_stop_are_not_retained() {
        let t0 = Instant::now();
        let mut session = Session::new();
        feed(
            &mut session,
            t0,
            &[
                (0, "START"),
                (10, "1.0,0.1;1.1,0.09"),
                (20, "1.2,0.08"),
                (30, "STOP"),
                (40, "9.9,9.9"),
            ],
        );
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.finish_cause(), Some(FinishCause::StopToken));
        assert_eq!(session.voltages(), vec![1.0, 1.1, 1.2]);
        assert_eq!(
            session.elapsed(),
            &[
                Duration::from_millis(10),
                Duration::from_millis(10),
                Duration::from_millis(20)
            ]
        );
    }

    #[test]
    fn timeout_finishes_without_stop() {
        let t0 = Instant::now();
        let mut session = Session::new();
        feed(&mut session, t0, &[(0, "START"), (100, "1.0,0.1")]);

        assert_eq!(session.check_timeout(t0 + Duration::from_secs(9), LIMIT), Step::Idle);
        assert_eq!(
            session.check_timeout(t0 + LIMIT, LIMIT),
            Step::Finished(FinishCause::Timeout)
        );
        assert_eq!(session.readings().len(), 1);
    }

    #[test]
    fn late_line_triggers_timeout_instead_of_append() {
        let t0 = Instant::now();
        let mut session = Session::new();
        let steps = feed(&mut session, t0, &[(0, "START"), (11_000, "1.0,0.1")]);
        assert_eq!(steps[1], Step::Finished(FinishCause::Timeout));
        assert!(session.readings().is_empty());
    }

    #[test]
    fn begin_discards_previous_run() {
        let t0 = Instant::now();
        let mut session = Session::new();
        feed(&mut session, t0, &[(0, "START"), (1, "1.0,0.1"), (2, "STOP")]);
        session.note_discarded_line();

        session.begin();
        assert_eq!(session, Session::new());
    }

    #[test]
    fn pure_poll_is_deterministic() {
        let t0 = Instant::now();
        let lines = ["START", "1.0,0.1;x", "2.0,0.2", "STOP"];
        let run = || {
            lines
                .iter()
                .enumerate()
                .fold(Session::new(), |s, (i, line)| {
                    poll(s, line, t0 + Duration::from_millis(i as u64), LIMIT)
                })
        };
        assert_eq!(run(), run());
        assert_eq!(run().rejected_segments(), 1);
    }

    #[traced_test]
    #[test]
    fn malformed_segments_are_logged() {
        let t0 = Instant::now();
        let mut session = Session::new();
        feed(&mut session, t0, &[(0, "START"), (1, "1.0,0.1;bad;2.0,0.2")]);
        assert_eq!(session.readings().len(), 2);
        assert!(logs_contain("dropping malformed segment"));
    }
}
