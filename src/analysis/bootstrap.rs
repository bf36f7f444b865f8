//! Bootstrap confidence interval for the mean.

use super::stats;
use crate::error::{AppResult, DaqError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default number of resamples.
pub const DEFAULT_ITERATIONS: usize = 10_000;
/// Default two-sided confidence level.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Bootstrap settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of resamples
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Confidence level in (0, 1)
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// RNG seed; `None` draws one from the OS
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            seed: None,
        }
    }
}

/// Summary of the bootstrap distribution of the mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSummary {
    /// Mean of the resampled means
    pub mean: f64,
    /// Lower percentile bound
    pub lower: f64,
    /// Upper percentile bound
    pub upper: f64,
    /// Confidence level used
    pub confidence_level: f64,
    /// Number of resamples
    pub iterations: usize,
}

/// Resample `values` with replacement and return the sorted resampled means.
pub fn resample_means<R: Rng + ?Sized>(values: &[f64], iterations: usize, rng: &mut R) -> Vec<f64> {
    let n = values.len();
    let mut means: Vec<f64> = (0..iterations)
        .map(|_| {
            let sum: f64 = (0..n).map(|_| values[rng.gen_range(0..n)]).sum();
            sum / n as f64
        })
        .collect();
    means.sort_by(f64::total_cmp);
    means
}

/// Percentile bootstrap of the mean.
pub fn bootstrap_mean(values: &[f64], config: &BootstrapConfig) -> AppResult<BootstrapSummary> {
    if values.is_empty() {
        return Err(DaqError::Analysis(
            "cannot bootstrap an empty sample".to_string(),
        ));
    }
    if config.iterations == 0 {
        return Err(DaqError::Analysis(
            "bootstrap needs at least one iteration".to_string(),
        ));
    }
    if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
        return Err(DaqError::Analysis(format!(
            "confidence level must be in (0, 1), got {}",
            config.confidence_level
        )));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let means = resample_means(values, config.iterations, &mut rng);

    let tail = (1.0 - config.confidence_level) / 2.0 * 100.0;
    let head = (1.0 + config.confidence_level) / 2.0 * 100.0;
    let missing = || DaqError::Analysis("bootstrap distribution is empty".to_string());

    let summary = BootstrapSummary {
        mean: stats::mean(&means).ok_or_else(missing)?,
        lower: stats::percentile_sorted(&means, tail).ok_or_else(missing)?,
        upper: stats::percentile_sorted(&means, head).ok_or_else(missing)?,
        confidence_level: config.confidence_level,
        iterations: config.iterations,
    };

    tracing::debug!(
        iterations = summary.iterations,
        lower = summary.lower,
        upper = summary.upper,
        "bootstrap complete"
    );

    Ok(summary)
}
