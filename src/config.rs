//! Configuration system using Figment.
//!
//! Configuration is loaded from, in increasing priority:
//! 1. built-in defaults (every section is optional)
//! 2. `config/planck_daq.toml` (or a path given on the command line)
//! 3. environment variables prefixed with `PLANCK_DAQ_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use planck_daq::config::DaqConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // PLANCK_DAQ_SERIAL__PORT=/dev/ttyUSB0 overrides [serial] port
//! let config = DaqConfig::load()?;
//! config.validate()?;
//! println!("Reading from {} at {} baud", config.serial.port, config.serial.baud_rate);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, DaqError};
use crate::estimation::EstimatorConfig;
use crate::logging::OutputFormat;
use crate::transport::SimulationConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/planck_daq.toml";
/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PLANCK_DAQ_";

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaqConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Serial port settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// Polling and timeout settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Threshold estimation settings
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Simulated rig used by `--simulate`
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Export of finished sessions
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// Serial transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port path (e.g. "/dev/rfcomm0", "/dev/ttyUSB0", "COM5")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-read timeout
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

/// Acquisition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Interval between polls of the transport
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Collection ends after this long without `STOP`
    #[serde(default = "default_max_duration", with = "humantime_serde")]
    pub max_duration: Duration,
}

/// Session export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Write CSV/JSON after each run
    #[serde(default)]
    pub enabled: bool,
    /// Output directory for data files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// File name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_name() -> String {
    "planck-daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "/dev/rfcomm0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_max_duration() -> Duration {
    Duration::from_secs(10)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_prefix() -> String {
    "photoelectric".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_duration: default_max_duration(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl DaqConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment variables still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    /// The provider chain, exposed so callers can merge further sources.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(DaqError::Configuration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.serial.port.trim().is_empty() {
            return invalid("serial.port cannot be empty".to_string());
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be greater than 0".to_string());
        }

        let poll = self.acquisition.poll_interval;
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&poll) {
            return invalid(format!(
                "acquisition.poll_interval {:?} outside {:?}..={:?}",
                poll, MIN_POLL_INTERVAL, MAX_POLL_INTERVAL
            ));
        }
        if self.acquisition.max_duration.is_zero() {
            return invalid("acquisition.max_duration must be greater than 0".to_string());
        }
        if self.acquisition.poll_interval > self.acquisition.max_duration {
            return invalid(format!(
                "acquisition.poll_interval ({:?}) exceeds max_duration ({:?})",
                self.acquisition.poll_interval, self.acquisition.max_duration
            ));
        }

        self.estimator
            .validate()
            .map_err(|e| DaqError::Configuration(format!("estimator: {}", e)))?;

        if self.simulation.readings_per_line == 0 {
            return invalid("simulation.readings_per_line must be at least 1".to_string());
        }

        if self.storage.enabled && self.storage.output_dir.as_os_str().is_empty() {
            return invalid("storage.output_dir cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::{LightSource, ThresholdPolicy};
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = DaqConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.acquisition.max_duration, Duration::from_secs(10));
    }

    #[test]
    fn parses_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[application]
log_level = "debug"
log_format = "json"

[serial]
port = "/dev/ttyUSB0"
baud_rate = 115200
read_timeout = "250ms"

[acquisition]
poll_interval = "1ms"
max_duration = "30s"

[estimator]
signal = "current"
policy = {{ kind = "adaptive_baseline", multiplier = 10.0 }}
light_source = {{ kind = "frequency", frequency_hz = 4.8e14 }}
"#
        )
        .unwrap();

        let config = DaqConfig::load_from(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.application.log_format, OutputFormat::Json);
        assert_eq!(config.serial.read_timeout, Duration::from_millis(250));
        assert_eq!(config.acquisition.poll_interval, Duration::from_millis(1));
        assert_eq!(
            config.estimator.policy,
            ThresholdPolicy::AdaptiveBaseline {
                baseline_window: 60,
                skip_offset: 30,
                multiplier: 10.0,
            }
        );
        assert_eq!(
            config.estimator.light_source,
            LightSource::Frequency {
                frequency_hz: 4.8e14
            }
        );
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = DaqConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_poll_interval_out_of_range() {
        let mut config = DaqConfig::default();
        config.acquisition.poll_interval = Duration::from_micros(200);
        assert!(config.validate().is_err());
        config.acquisition.poll_interval = Duration::from_secs(1);
        assert!(config.validate().is_err());

        config.acquisition.poll_interval = Duration::from_millis(100);
        config.acquisition.max_duration = Duration::from_millis(50);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_positive_decay_threshold() {
        let mut config = DaqConfig::default();
        config.estimator.policy = ThresholdPolicy::FixedDecay {
            decay_threshold: 0.5,
        };
        assert!(config.validate().is_err());
    }
}
