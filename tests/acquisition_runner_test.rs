use planck_daq::acquisition::{Acquisition, AcquisitionRunner, FinishCause, SessionState};
use planck_daq::estimation::{
    EstimationReason, EstimatorConfig, PolicyKind, ThresholdEstimator, ThresholdPolicy,
};
use planck_daq::transport::{ScriptedEvent, ScriptedTransport, SimulatedRig, SimulationConfig};
use planck_daq::DaqError;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(1);

fn acquisition(max_duration: Duration) -> Acquisition {
    Acquisition::new(max_duration, ThresholdEstimator::default())
}

#[tokio::test]
async fn test_scripted_run_finishes_on_stop() {
    let transport = ScriptedTransport::from_lines([
        "boot",
        "START",
        "3.00,0.050;2.99,0.049;2.98,0.048",
        "1.97,0.000;1.96,0.000",
        "STOP",
        "4.0,0.1",
    ]);
    let mut runner = AcquisitionRunner::new(transport, acquisition(Duration::from_secs(5)), POLL);

    let report = runner.run().await.unwrap();

    assert_eq!(report.session.finish_cause(), Some(FinishCause::StopToken));
    assert_eq!(report.session.readings().len(), 5);
    assert_eq!(report.estimation.reason, EstimationReason::Ok);
    assert_eq!(report.estimation.sample_index, Some(3));
    assert_eq!(report.estimation.threshold_voltage, Some(1.97));
    // The line after STOP is never read.
    assert_eq!(runner.transport().remaining(), 1);
}

#[tokio::test]
async fn test_unreadable_lines_do_not_stop_collection() {
    let transport = ScriptedTransport::from_events([
        ScriptedEvent::Line("START".into()),
        ScriptedEvent::Line("2.0,0.1".into()),
        ScriptedEvent::DecodeError,
        ScriptedEvent::ReadError("timed out".into()),
        ScriptedEvent::Line("1.0,0.0".into()),
        ScriptedEvent::Line("STOP".into()),
    ]);
    let mut runner = AcquisitionRunner::new(transport, acquisition(Duration::from_secs(5)), POLL);

    let report = runner.run().await.unwrap();
    assert_eq!(report.session.readings().len(), 2);
    assert_eq!(report.session.discarded_lines(), 2);
}

#[tokio::test]
async fn test_transport_loss_keeps_partial_session() {
    let transport = ScriptedTransport::from_events([
        ScriptedEvent::Line("START".into()),
        ScriptedEvent::Line("2.0,0.1;1.9,0.1".into()),
        ScriptedEvent::Lost,
    ]);
    let mut runner = AcquisitionRunner::new(transport, acquisition(Duration::from_secs(5)), POLL);

    let error = runner.run().await.unwrap_err();
    assert!(matches!(error, DaqError::TransportLost(_)));

    let session = runner.acquisition().session();
    assert_eq!(session.state(), SessionState::Collecting);
    assert_eq!(session.readings().len(), 2);
    assert!(runner.acquisition().estimation().is_none());
}

#[tokio::test]
async fn test_timeout_without_stop() {
    let rig = SimulatedRig::new(&SimulationConfig {
        noise: 0.0,
        seed: Some(1),
        send_stop: false,
        ..SimulationConfig::default()
    });
    let mut runner = AcquisitionRunner::new(rig, acquisition(Duration::from_millis(200)), POLL);

    let report = runner.run().await.unwrap();
    assert_eq!(report.session.finish_cause(), Some(FinishCause::Timeout));
    assert!(report.session.elapsed().iter().all(|t| *t < Duration::from_millis(200)));
}

#[tokio::test]
async fn test_simulated_rig_fixed_decay() {
    let config = SimulationConfig {
        noise: 0.0,
        seed: Some(5),
        ..SimulationConfig::default()
    };
    let mut runner = AcquisitionRunner::new(
        SimulatedRig::new(&config),
        acquisition(Duration::from_secs(10)),
        POLL,
    );

    let report = runner.run().await.unwrap();
    assert_eq!(report.session.readings().len(), 120);
    assert_eq!(report.estimation.policy, PolicyKind::FixedDecay);
    let voltage = report.estimation.threshold_voltage.unwrap();
    assert!((voltage - 1.97).abs() < 1e-9, "threshold {}", voltage);
}

#[tokio::test]
async fn test_simulated_rig_adaptive_baseline() {
    let config = SimulationConfig {
        slope_per_sample: 0.0,
        noise: 0.002,
        seed: Some(11),
        ..SimulationConfig::default()
    };
    let estimator = ThresholdEstimator::new(EstimatorConfig {
        policy: ThresholdPolicy::adaptive(),
        ..EstimatorConfig::default()
    })
    .unwrap();
    let mut runner = AcquisitionRunner::new(
        SimulatedRig::new(&config),
        Acquisition::new(Duration::from_secs(10), estimator),
        POLL,
    );

    let report = runner.run().await.unwrap();
    assert_eq!(report.estimation.policy, PolicyKind::AdaptiveBaseline);
    assert_eq!(report.estimation.sample_index, Some(40));
    let voltage = report.estimation.threshold_voltage.unwrap();
    assert!((voltage - 1.97).abs() < 0.01, "threshold {}", voltage);
}

#[tokio::test]
async fn test_rerun_starts_fresh_session() {
    let mut transport = ScriptedTransport::from_lines(["START", "2.0,0.1", "1.0,0.0", "STOP"]);
    transport.push(ScriptedEvent::Line("START".into()));
    transport.push(ScriptedEvent::Line("5.0,0.1".into()));
    transport.push(ScriptedEvent::Line("STOP".into()));
    let mut runner = AcquisitionRunner::new(transport, acquisition(Duration::from_secs(5)), POLL);

    let first = runner.run().await.unwrap();
    assert_eq!(first.session.readings().len(), 2);

    let second = runner.run().await.unwrap();
    assert_eq!(second.session.voltages(), vec![5.0]);
    assert_eq!(second.estimation.reason, EstimationReason::InsufficientData);
}
