//! Threshold voltage and Planck's constant estimation.
//!
//! Runs once per finished acquisition. The estimator picks the sample where the photocurrent
//! curve breaks (see [`ThresholdPolicy`]), treats its voltage as the stopping voltage and
//! converts it with `h = e * V / f`.

pub mod policy;

pub use policy::{first_differences, PolicyKind, ThresholdPolicy};

use crate::error::{AppResult, DaqError};
use crate::measurement_types::Reading;
use serde::{Deserialize, Serialize};

/// Elementary charge in coulombs.
pub const ELEMENTARY_CHARGE: f64 = 1.602e-19;
/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 3.00e8;

/// Light illuminating the photocathode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightSource {
    /// Frequency derived as `c / wavelength`
    Wavelength {
        /// Wavelength in meters
        wavelength_m: f64,
    },
    /// Frequency given directly
    Frequency {
        /// Frequency in hertz
        frequency_hz: f64,
    },
}

impl Default for LightSource {
    fn default() -> Self {
        // Red LED as measured on the grating spectrometer.
        LightSource::Wavelength {
            wavelength_m: 625e-9,
        }
    }
}

impl LightSource {
    /// Optical frequency in hertz.
    pub fn frequency(&self) -> f64 {
        match *self {
            LightSource::Wavelength { wavelength_m } => SPEED_OF_LIGHT / wavelength_m,
            LightSource::Frequency { frequency_hz } => frequency_hz,
        }
    }

    /// Reject non-positive or non-finite values.
    pub fn validate(&self) -> Result<(), String> {
        let (name, value) = match *self {
            LightSource::Wavelength { wavelength_m } => ("wavelength_m", wavelength_m),
            LightSource::Frequency { frequency_hz } => ("frequency_hz", frequency_hz),
        };
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(format!("{} must be a finite positive number, got {}", name, value))
        }
    }
}

/// Which series the policy differentiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSignal {
    /// Voltage series
    #[default]
    Voltage,
    /// Current series (the threshold is still read from the voltage at that sample)
    Current,
}

/// Estimator settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Detection strategy
    #[serde(default)]
    pub policy: ThresholdPolicy,
    /// Series fed to the strategy
    #[serde(default)]
    pub signal: DetectionSignal,
    /// Illumination
    #[serde(default)]
    pub light_source: LightSource,
}

impl EstimatorConfig {
    /// Validate policy and light source.
    pub fn validate(&self) -> Result<(), String> {
        self.policy.validate()?;
        self.light_source.validate()
    }
}

/// Why an estimate does or does not carry values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationReason {
    /// Threshold found and converted
    Ok,
    /// Fewer than two samples
    InsufficientData,
    /// The policy found no step
    NoSignificantChange,
}

/// Outcome of one estimation run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Voltage at the detected sample
    pub threshold_voltage: Option<f64>,
    /// `e * threshold_voltage / f` in J*s
    pub planck_constant: Option<f64>,
    /// Outcome
    pub reason: EstimationReason,
    /// Strategy that produced this result
    pub policy: PolicyKind,
    /// Index of the detected sample in the reading sequence
    pub sample_index: Option<usize>,
}

impl EstimationResult {
    fn without_threshold(reason: EstimationReason, policy: PolicyKind) -> Self {
        Self {
            threshold_voltage: None,
            planck_constant: None,
            reason,
            policy,
            sample_index: None,
        }
    }

    /// Whether a threshold was found.
    pub fn is_ok(&self) -> bool {
        self.reason == EstimationReason::Ok
    }
}

/// Stateless threshold estimator.
#[derive(Debug, Clone, Default)]
pub struct ThresholdEstimator {
    config: EstimatorConfig,
}

impl ThresholdEstimator {
    /// Create an estimator from its settings.
    ///
    /// # Errors
    /// [`DaqError::Configuration`] if the policy or light source is invalid; a zero frequency
    /// or wavelength would otherwise turn every estimate into `inf` or `NaN`.
    pub fn new(config: EstimatorConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| DaqError::Configuration(format!("estimator: {}", e)))?;
        Ok(Self { config })
    }

    /// Settings in use.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate from a finished session's readings.
    pub fn estimate(&self, readings: &[Reading]) -> EstimationResult {
        let voltages: Vec<f64> = readings.iter().map(|r| r.voltage).collect();
        match self.config.signal {
            DetectionSignal::Voltage => self.estimate_series(&voltages, &voltages),
            DetectionSignal::Current => {
                let currents: Vec<f64> = readings.iter().map(|r| r.current).collect();
                self.estimate_series(&voltages, &currents)
            }
        }
    }

    /// Estimate from a bare voltage series.
    pub fn estimate_voltages(&self, voltages: &[f64]) -> EstimationResult {
        self.estimate_series(voltages, voltages)
    }

    /// Detect on `detection` and read the threshold from the parallel `voltages`.
    pub fn estimate_series(&self, voltages: &[f64], detection: &[f64]) -> EstimationResult {
        let kind = self.config.policy.kind();

        if voltages.len() < 2 || detection.len() < 2 {
            tracing::debug!(samples = voltages.len(), "not enough samples to estimate");
            return EstimationResult::without_threshold(EstimationReason::InsufficientData, kind);
        }

        let len = voltages.len().min(detection.len());
        let Some(index) = self.config.policy.detect(&detection[..len]) else {
            tracing::info!(policy = ?kind, samples = len, "no significant change detected");
            return EstimationResult::without_threshold(
                EstimationReason::NoSignificantChange,
                kind,
            );
        };

        let threshold_voltage = voltages[index];
        let frequency = self.config.light_source.frequency();
        let planck_constant = ELEMENTARY_CHARGE * threshold_voltage / frequency;

        tracing::info!(
            policy = ?kind,
            index,
            threshold_voltage,
            planck_constant,
            "threshold detected"
        );

        EstimationResult {
            threshold_voltage: Some(threshold_voltage),
            planck_constant: Some(planck_constant),
            reason: EstimationReason::Ok,
            policy: kind,
            sample_index: Some(index),
        }
    }
}
