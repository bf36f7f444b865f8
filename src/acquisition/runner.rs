//! Timer-driven polling of a [`LineTransport`].
//!
//! Each tick of a `tokio::time::interval` runs the timeout check, then, if bytes are waiting,
//! reads and applies at most one line. The runner owns its transport for the whole run; there
//! is no other reader. Cancelling a run is dropping the future.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use planck_daq::acquisition::{Acquisition, AcquisitionRunner};
//! use planck_daq::estimation::ThresholdEstimator;
//! use planck_daq::transport::{SimulatedRig, SimulationConfig};
//!
//! # async fn example() -> planck_daq::error::AppResult<()> {
//! let rig = SimulatedRig::new(&SimulationConfig::default());
//! let acquisition = Acquisition::new(Duration::from_secs(10), ThresholdEstimator::default());
//! let mut runner = AcquisitionRunner::new(rig, acquisition, Duration::from_millis(5));
//! let report = runner.run().await?;
//! println!("{} readings, {:?}", report.session.readings().len(), report.estimation.reason);
//! # Ok(())
//! # }
//! ```

use super::controller::Acquisition;
use super::session::{Session, Step};
use crate::error::AppResult;
use crate::estimation::EstimationResult;
use crate::transport::LineTransport;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Data products of one finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Finished session
    pub session: Session,
    /// Its estimate
    pub estimation: EstimationResult,
    /// Timer ticks executed
    pub ticks: u64,
}

/// Polls a transport on a fixed interval until the session finishes.
pub struct AcquisitionRunner<T: LineTransport> {
    transport: T,
    acquisition: Acquisition,
    poll_interval: Duration,
    ticks: u64,
}

impl<T: LineTransport> AcquisitionRunner<T> {
    /// Create a runner; nothing is read until [`AcquisitionRunner::run`].
    pub fn new(transport: T, acquisition: Acquisition, poll_interval: Duration) -> Self {
        Self {
            transport,
            acquisition,
            poll_interval,
            ticks: 0,
        }
    }

    /// Current acquisition state, including after a failed run.
    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    /// The owned transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One poll: timeout check, then at most one line.
    ///
    /// # Errors
    /// Non-recoverable transport errors. Per-line read/decode failures are absorbed.
    pub fn poll_once(&mut self, now: Instant) -> AppResult<Step> {
        self.ticks += 1;

        let step = self.acquisition.handle_tick(now);
        if self.acquisition.session().is_finished() {
            return Ok(step);
        }

        let available = match self.transport.bytes_available() {
            Ok(n) => n,
            Err(e) if e.is_recoverable() => {
                self.acquisition.handle_line_error(&e);
                return Ok(Step::Idle);
            }
            Err(e) => return Err(e),
        };
        if available == 0 {
            return Ok(Step::Idle);
        }

        match self.transport.read_line() {
            Ok(line) => Ok(self.acquisition.handle_line(&line, now)),
            Err(e) if e.is_recoverable() => {
                self.acquisition.handle_line_error(&e);
                Ok(Step::Idle)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a fresh session and poll until it finishes.
    ///
    /// # Errors
    /// Returns the first non-recoverable transport error. The session is left as it was when
    /// the error occurred (see [`AcquisitionRunner::acquisition`]); it is not restarted.
    #[tracing::instrument(skip(self), fields(transport = %self.transport.describe()))]
    pub async fn run(&mut self) -> AppResult<RunReport> {
        self.acquisition.begin();
        self.ticks = 0;

        tracing::info!(
            interval = ?self.poll_interval,
            max_duration = ?self.acquisition.max_duration(),
            "waiting for START"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let now = interval.tick().await.into_std();

            if let Err(error) = self.poll_once(now) {
                tracing::error!(
                    %error,
                    state = ?self.acquisition.session().state(),
                    readings = self.acquisition.session().readings().len(),
                    "transport failed, polling halted"
                );
                return Err(error);
            }

            if let Some(estimation) = self.acquisition.estimation() {
                let session = self.acquisition.session();
                tracing::info!(
                    readings = session.readings().len(),
                    rejected_segments = session.rejected_segments(),
                    discarded_lines = session.discarded_lines(),
                    ticks = self.ticks,
                    "acquisition finished"
                );
                return Ok(RunReport {
                    session: session.clone(),
                    estimation: estimation.clone(),
                    ticks: self.ticks,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::session::SessionState;
    use crate::error::DaqError;
    use crate::estimation::ThresholdEstimator;
    use crate::transport::{ScriptedEvent, ScriptedTransport};

    fn runner(transport: ScriptedTransport) -> AcquisitionRunner<ScriptedTransport> {
        AcquisitionRunner::new(
            transport,
            Acquisition::new(Duration::from_secs(5), ThresholdEstimator::default()),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn poll_once_reads_at_most_one_line() {
        let mut runner = runner(ScriptedTransport::from_lines(["START", "1.0,0.1", "STOP"]));
        let now = Instant::now();
        assert_eq!(runner.poll_once(now).unwrap(), Step::Started);
        assert_eq!(runner.transport().remaining(), 2);
        assert_eq!(runner.poll_once(now).unwrap(), Step::Appended(1));
        assert_eq!(runner.transport().remaining(), 1);
    }

    #[test]
    fn poll_once_absorbs_line_errors() {
        let mut runner = runner(ScriptedTransport::from_events([
            ScriptedEvent::Line("START".into()),
            ScriptedEvent::DecodeError,
            ScriptedEvent::ReadError("timeout".into()),
        ]));
        let now = Instant::now();
        runner.poll_once(now).unwrap();
        assert_eq!(runner.poll_once(now).unwrap(), Step::Idle);
        assert_eq!(runner.poll_once(now).unwrap(), Step::Idle);
        assert_eq!(runner.acquisition().session().discarded_lines(), 2);
        assert_eq!(
            runner.acquisition().session().state(),
            SessionState::Collecting
        );
    }

    #[test]
    fn run_ignores_data_before_start() {
        let mut runner = runner(ScriptedTransport::from_lines([
            "9.9,0.9",
            "START",
            "2.0,0.1",
            "STOP",
        ]));
        let report = tokio_test::block_on(runner.run()).unwrap();
        assert_eq!(report.session.voltages(), vec![2.0]);
        assert_eq!(report.ticks, 4);
    }

    #[test]
    fn poll_once_surfaces_transport_loss() {
        let mut runner = runner(ScriptedTransport::from_events([
            ScriptedEvent::Line("START".into()),
            ScriptedEvent::Lost,
        ]));
        let now = Instant::now();
        runner.poll_once(now).unwrap();
        assert!(matches!(
            runner.poll_once(now),
            Err(DaqError::TransportLost(_))
        ));
    }
}
