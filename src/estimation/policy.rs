//! Threshold detection strategies.
//!
//! Both strategies work on first differences of a sampled series and return the index of the
//! *sample* the detected step lands on (difference index + 1), so the caller can look up the
//! voltage at that position directly.

use crate::analysis::stats;
use serde::{Deserialize, Serialize};

/// Default decay constant for [`ThresholdPolicy::FixedDecay`].
pub const DEFAULT_DECAY_THRESHOLD: f64 = -0.05;
/// Default number of trailing differences used as the noise baseline.
pub const DEFAULT_BASELINE_WINDOW: usize = 60;
/// Default number of leading differences ignored when scanning.
pub const DEFAULT_SKIP_OFFSET: usize = 30;
/// Default baseline standard-deviation multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 15.0;

/// Named threshold detection strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// First change in the decay rate that falls below a fixed negative constant.
    FixedDecay {
        /// Negative step size that counts as the discontinuity
        #[serde(default = "default_decay_threshold")]
        decay_threshold: f64,
    },
    /// First difference whose magnitude exceeds `multiplier` x the trailing-noise deviation.
    AdaptiveBaseline {
        /// Trailing differences forming the baseline
        #[serde(default = "default_baseline_window")]
        baseline_window: usize,
        /// Leading differences skipped during the scan
        #[serde(default = "default_skip_offset")]
        skip_offset: usize,
        /// Multiplier applied to the baseline standard deviation
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
}

/// Name-only view of [`ThresholdPolicy`], recorded in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// See [`ThresholdPolicy::FixedDecay`]
    FixedDecay,
    /// See [`ThresholdPolicy::AdaptiveBaseline`]
    AdaptiveBaseline,
}

fn default_decay_threshold() -> f64 {
    DEFAULT_DECAY_THRESHOLD
}

fn default_baseline_window() -> usize {
    DEFAULT_BASELINE_WINDOW
}

fn default_skip_offset() -> usize {
    DEFAULT_SKIP_OFFSET
}

fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::FixedDecay {
            decay_threshold: DEFAULT_DECAY_THRESHOLD,
        }
    }
}

impl ThresholdPolicy {
    /// Adaptive policy with the stock window/skip/multiplier.
    pub fn adaptive() -> Self {
        ThresholdPolicy::AdaptiveBaseline {
            baseline_window: DEFAULT_BASELINE_WINDOW,
            skip_offset: DEFAULT_SKIP_OFFSET,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }

    /// Which strategy this is.
    pub fn kind(&self) -> PolicyKind {
        match self {
            ThresholdPolicy::FixedDecay { .. } => PolicyKind::FixedDecay,
            ThresholdPolicy::AdaptiveBaseline { .. } => PolicyKind::AdaptiveBaseline,
        }
    }

    /// Check parameters for values that can never detect anything sensible.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            ThresholdPolicy::FixedDecay { decay_threshold } => {
                if !(decay_threshold.is_finite() && decay_threshold < 0.0) {
                    return Err(format!(
                        "decay_threshold must be a finite negative number, got {}",
                        decay_threshold
                    ));
                }
            }
            ThresholdPolicy::AdaptiveBaseline {
                baseline_window,
                multiplier,
                ..
            } => {
                if baseline_window == 0 {
                    return Err("baseline_window must be at least 1".to_string());
                }
                if !(multiplier.is_finite() && multiplier > 0.0) {
                    return Err(format!(
                        "multiplier must be a finite positive number, got {}",
                        multiplier
                    ));
                }
            }
        }
        Ok(())
    }

    /// Locate the step in `series`. Returns the sample index, or `None` when nothing qualifies.
    pub fn detect(&self, series: &[f64]) -> Option<usize> {
        let diffs = first_differences(series);
        match *self {
            ThresholdPolicy::FixedDecay { decay_threshold } => {
                detect_fixed_decay(&diffs, decay_threshold)
            }
            ThresholdPolicy::AdaptiveBaseline {
                baseline_window,
                skip_offset,
                multiplier,
            } => detect_adaptive_baseline(&diffs, baseline_window, skip_offset, multiplier),
        }
    }
}

/// `values[i + 1] - values[i]` for every adjacent pair.
pub fn first_differences(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Looks for a break in the decay rate: the first adjacent pair of differences whose change
/// `diff[i] - diff[i - 1]` falls below `decay_threshold`. Returns the sample the steeper
/// difference lands on (`i + 1`). Difference index 0 has no predecessor and never qualifies.
fn detect_fixed_decay(diffs: &[f64], decay_threshold: f64) -> Option<usize> {
    diffs
        .windows(2)
        .position(|w| w[1] - w[0] < decay_threshold)
        .map(|j| j + 2)
}

fn detect_adaptive_baseline(
    diffs: &[f64],
    baseline_window: usize,
    skip_offset: usize,
    multiplier: f64,
) -> Option<usize> {
    if diffs.is_empty() {
        return None;
    }

    let baseline = &diffs[diffs.len().saturating_sub(baseline_window)..];
    let noise = stats::std_dev(baseline, 0)?;
    let threshold = multiplier * noise;

    tracing::trace!(noise, threshold, skip_offset, "adaptive baseline computed");

    diffs
        .iter()
        .enumerate()
        .skip(skip_offset)
        .find(|(_, d)| d.abs() > threshold)
        .map(|(i, _)| i + 1)
}
