//! Session plus the estimator hook that fires when it finishes.

use super::session::{Session, Step};
use crate::error::DaqError;
use crate::estimation::{EstimationResult, ThresholdEstimator};
use crate::protocol::parse_line;
use std::time::{Duration, Instant};

/// Owns the current [`Session`] and runs the [`ThresholdEstimator`] exactly once per finished
/// session.
#[derive(Debug, Clone)]
pub struct Acquisition {
    session: Session,
    max_duration: Duration,
    estimator: ThresholdEstimator,
    estimation: Option<EstimationResult>,
}

impl Acquisition {
    /// New acquisition in `AwaitingStart`.
    pub fn new(max_duration: Duration, estimator: ThresholdEstimator) -> Self {
        Self {
            session: Session::new(),
            max_duration,
            estimator,
            estimation: None,
        }
    }

    /// User-triggered start; drops the previous session and its estimate.
    pub fn begin(&mut self) {
        self.session.begin();
        self.estimation = None;
    }

    /// Current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Estimate of the finished session, if it has finished.
    pub fn estimation(&self) -> Option<&EstimationResult> {
        self.estimation.as_ref()
    }

    /// Maximum collection time.
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Parse and apply one decoded line.
    pub fn handle_line(&mut self, line: &str, now: Instant) -> Step {
        let frame = parse_line(line);
        let step = self.session.apply(&frame, now, self.max_duration);
        self.after(step)
    }

    /// Timer tick without a line.
    pub fn handle_tick(&mut self, now: Instant) -> Step {
        let step = self.session.check_timeout(now, self.max_duration);
        self.after(step)
    }

    /// A single line could not be read or decoded. Logged and counted; state is unchanged.
    pub fn handle_line_error(&mut self, error: &DaqError) {
        self.session.note_discarded_line();
        tracing::warn!(%error, state = ?self.session.state(), "discarding unreadable line");
    }

    /// Split into the finished session and its estimate.
    pub fn into_parts(self) -> (Session, Option<EstimationResult>) {
        (self.session, self.estimation)
    }

    fn after(&mut self, step: Step) -> Step {
        if let Step::Finished(cause) = step {
            if self.estimation.is_none() {
                let result = self.estimator.estimate(self.session.readings());
                tracing::info!(?cause, reason = ?result.reason, "session finished");
                self.estimation = Some(result);
            }
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::session::{FinishCause, SessionState};
    use crate::estimation::{EstimationReason, EstimatorConfig};

    fn acquisition() -> Acquisition {
        Acquisition::new(
            Duration::from_secs(5),
            ThresholdEstimator::new(EstimatorConfig::default()).unwrap(),
        )
    }

    #[test]
    fn estimator_runs_on_stop() {
        let t0 = Instant::now();
        let mut acq = acquisition();
        for line in ["START", "2.0,0.1;1.9,0.1;1.8,0.1", "0.5,0.0;0.4,0.0", "STOP"] {
            acq.handle_line(line, t0);
        }
        let result = acq.estimation().unwrap();
        assert_eq!(result.reason, EstimationReason::Ok);
        assert_eq!(result.threshold_voltage, Some(0.5));
    }

    #[test]
    fn estimator_runs_on_timeout_with_insufficient_data() {
        let t0 = Instant::now();
        let mut acq = acquisition();
        acq.handle_line("START", t0);
        acq.handle_line("1.0,0.1", t0);
        assert!(acq.estimation().is_none());

        let step = acq.handle_tick(t0 + Duration::from_secs(6));
        assert_eq!(step, Step::Finished(FinishCause::Timeout));
        assert_eq!(
            acq.estimation().map(|r| r.reason),
            Some(EstimationReason::InsufficientData)
        );
    }

    #[test]
    fn line_errors_do_not_change_state() {
        let t0 = Instant::now();
        let mut acq = acquisition();
        acq.handle_line("START", t0);
        acq.handle_line_error(&DaqError::Decode("invalid utf-8".into()));
        assert_eq!(acq.session().state(), SessionState::Collecting);
        assert_eq!(acq.session().discarded_lines(), 1);
    }

    #[test]
    fn begin_clears_estimate() {
        let t0 = Instant::now();
        let mut acq = acquisition();
        acq.handle_line("START", t0);
        acq.handle_line("STOP", t0);
        assert!(acq.estimation().is_some());

        acq.begin();
        assert!(acq.estimation().is_none());
        assert_eq!(acq.session().state(), SessionState::AwaitingStart);
    }
}
