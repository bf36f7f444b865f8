use planck_daq::config::DaqConfig;
use planck_daq::estimation::ThresholdPolicy;
use planck_daq::logging::OutputFormat;
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/planck_daq.toml")
}

#[test]
#[serial]
fn test_shipped_config_is_valid() {
    let config = DaqConfig::load_from(shipped_config()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.serial.port, "/dev/rfcomm0");
    assert_eq!(config.acquisition.poll_interval, Duration::from_millis(10));
    assert_eq!(config.estimator.policy, ThresholdPolicy::default());
    assert_eq!(config.application.log_format, OutputFormat::Compact);
    assert!(!config.storage.enabled);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = DaqConfig::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, DaqConfig::default());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    std::env::set_var("PLANCK_DAQ_SERIAL__PORT", "/dev/ttyUSB3");
    std::env::set_var("PLANCK_DAQ_ACQUISITION__MAX_DURATION", "45s");
    let config = DaqConfig::load_from(shipped_config());
    std::env::remove_var("PLANCK_DAQ_SERIAL__PORT");
    std::env::remove_var("PLANCK_DAQ_ACQUISITION__MAX_DURATION");

    let config = config.unwrap();
    assert_eq!(config.serial.port, "/dev/ttyUSB3");
    assert_eq!(config.acquisition.max_duration, Duration::from_secs(45));
    assert_eq!(config.serial.baud_rate, 9600);
}

#[test]
#[serial]
fn test_malformed_duration_is_rejected() {
    std::env::set_var("PLANCK_DAQ_ACQUISITION__POLL_INTERVAL", "soon");
    let result = DaqConfig::load_from(shipped_config());
    std::env::remove_var("PLANCK_DAQ_ACQUISITION__POLL_INTERVAL");

    assert!(result.is_err());
}
