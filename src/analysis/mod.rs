//! Offline error analysis of repeated Planck's constant measurements.
//!
//! A dataset lists the stopping voltages and h values obtained from earlier runs together with
//! the spectrometer geometry used to determine the LED wavelength. [`analyze`] turns it into an
//! [`AnalysisReport`]: descriptive statistics, propagated per-measurement uncertainties, a
//! one-sample t-test against the accepted value and a bootstrap interval for the mean.
//!
//! # Example
//! ```no_run
//! use planck_daq::analysis::{analyze, AnalysisDataset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = AnalysisDataset::load("config/red_led.toml")?;
//! let report = analyze(&dataset)?;
//! println!("h = {:.4e} +/- {:.1e}", report.planck.mean, report.planck.std_dev);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod stats;
pub mod uncertainty;

pub use bootstrap::{bootstrap_mean, BootstrapConfig, BootstrapSummary};
pub use stats::TTest;
pub use uncertainty::{Adc, Grating, SpectralLine};

use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Accepted value of Planck's constant in J*s.
pub const ACCEPTED_PLANCK: f64 = 6.626e-34;

fn default_accepted_planck() -> f64 {
    ACCEPTED_PLANCK
}

/// Hand-entered measurement results for one light source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDataset {
    /// Human-readable name (e.g. "Red LED")
    pub label: String,
    /// Stopping voltage per run in volts
    pub stopping_voltages: Vec<f64>,
    /// Planck's constant per run in J*s
    pub planck_values: Vec<f64>,
    /// Reference value for the t-test
    #[serde(default = "default_accepted_planck")]
    pub accepted_planck: f64,
    /// Spectrometer geometry
    pub grating: Grating,
    /// ADC used to sample voltages
    #[serde(default)]
    pub adc: Adc,
    /// Bootstrap settings
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AnalysisDataset {
    /// Read a dataset from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Parse a dataset from TOML text.
    pub fn from_toml(text: &str) -> AppResult<Self> {
        toml::from_str(text).map_err(|e| DaqError::Analysis(format!("invalid dataset: {}", e)))
    }

    /// Reject datasets the statistics cannot handle.
    pub fn validate(&self) -> AppResult<()> {
        if self.planck_values.len() < 2 {
            return Err(DaqError::Analysis(format!(
                "need at least 2 measurements, got {}",
                self.planck_values.len()
            )));
        }
        if self.stopping_voltages.len() != self.planck_values.len() {
            return Err(DaqError::Analysis(format!(
                "{} stopping voltages but {} h values",
                self.stopping_voltages.len(),
                self.planck_values.len()
            )));
        }
        if !(self.grating.spacing_m.is_finite() && self.grating.spacing_m > 0.0) {
            return Err(DaqError::Analysis(
                "grating spacing must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Mean and sample standard deviation of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (ddof = 1)
    pub std_dev: f64,
}

impl SeriesSummary {
    fn of(values: &[f64], name: &str) -> AppResult<Self> {
        let mean = stats::mean(values)
            .ok_or_else(|| DaqError::Analysis(format!("{} is empty", name)))?;
        let std_dev = stats::std_dev(values, 1)
            .ok_or_else(|| DaqError::Analysis(format!("{} needs at least 2 values", name)))?;
        Ok(Self { mean, std_dev })
    }
}

/// One row of the per-measurement table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    /// Stopping voltage in volts
    pub stopping_voltage: f64,
    /// Measured h in J*s
    pub planck_constant: f64,
    /// Propagated uncertainty of h in J*s
    pub sigma_planck: f64,
}

/// Everything derived from an [`AnalysisDataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Dataset label
    pub label: String,
    /// Stopping voltage statistics
    pub stopping_voltage: SeriesSummary,
    /// Planck's constant statistics
    pub planck: SeriesSummary,
    /// Half-LSB quantization error in volts
    pub sigma_adc: f64,
    /// Combined voltage uncertainty in volts
    pub sigma_voltage: f64,
    /// Wavelength and frequency with uncertainties
    pub spectral_line: SpectralLine,
    /// Per-measurement table
    pub measurements: Vec<MeasurementRow>,
    /// Reference value used for the t-test
    pub accepted_planck: f64,
    /// One-sample t-test against the accepted value
    pub t_test: TTest,
    /// Bootstrap interval of the mean h
    pub bootstrap: BootstrapSummary,
}

/// Run the full error analysis.
pub fn analyze(dataset: &AnalysisDataset) -> AppResult<AnalysisReport> {
    dataset.validate()?;

    let span = tracing::info_span!("analysis", label = %dataset.label);
    let _enter = span.enter();

    let stopping_voltage = SeriesSummary::of(&dataset.stopping_voltages, "stopping_voltages")?;
    let planck = SeriesSummary::of(&dataset.planck_values, "planck_values")?;

    let sigma_adc = dataset.adc.quantization_sigma();
    let sigma_voltage = uncertainty::voltage_uncertainty(stopping_voltage.std_dev, sigma_adc);
    let spectral_line = dataset.grating.spectral_line();

    let measurements = dataset
        .stopping_voltages
        .iter()
        .zip(&dataset.planck_values)
        .map(|(&voltage, &h)| MeasurementRow {
            stopping_voltage: voltage,
            planck_constant: h,
            sigma_planck: uncertainty::planck_uncertainty(voltage, sigma_voltage, &spectral_line),
        })
        .collect();

    let t_test = stats::one_sample_t_test(&dataset.planck_values, dataset.accepted_planck)
        .ok_or_else(|| DaqError::Analysis("t-test needs at least 2 values".to_string()))?;

    let bootstrap = bootstrap::bootstrap_mean(&dataset.planck_values, &dataset.bootstrap)?;

    tracing::info!(
        mean = planck.mean,
        std_dev = planck.std_dev,
        t = t_test.t_statistic,
        p = t_test.p_value,
        "analysis complete"
    );

    Ok(AnalysisReport {
        label: dataset.label.clone(),
        stopping_voltage,
        planck,
        sigma_adc,
        sigma_voltage,
        spectral_line,
        measurements,
        accepted_planck: dataset.accepted_planck,
        t_test,
        bootstrap,
    })
}
