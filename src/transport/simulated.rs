//! Simulated photodiode rig.
//!
//! Produces the same line stream the microcontroller firmware does: a boot banner,
//! `START`, a sweep packed several readings per line, then `STOP`. The voltage trace decays
//! slowly, falls sharply onto the configured stopping voltage, then keeps decaying slowly,
//! while the photocurrent collapses to the noise floor at the edge. Both threshold policies
//! land on the stopping voltage with the default parameters.

use super::LineTransport;
use crate::error::AppResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Shape of the synthetic sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Voltage the trace falls onto, in volts
    pub stopping_voltage: f64,
    /// Height of the plateau above the stopping voltage
    pub step_height: f64,
    /// Slow decay per sample on either side of the edge
    pub slope_per_sample: f64,
    /// Samples before the edge
    pub samples_before_edge: usize,
    /// Samples from the edge onwards
    pub samples_after_edge: usize,
    /// Readings packed into one line
    pub readings_per_line: usize,
    /// Peak photocurrent at the start of the sweep
    pub peak_current: f64,
    /// Uniform noise amplitude added to every value
    pub noise: f64,
    /// RNG seed; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Emit `STOP` at the end (disable to exercise the timeout path)
    pub send_stop: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stopping_voltage: 1.97,
            step_height: 1.0,
            slope_per_sample: 0.001,
            samples_before_edge: 40,
            samples_after_edge: 80,
            readings_per_line: 4,
            peak_current: 0.05,
            noise: 0.0002,
            seed: None,
            send_stop: true,
        }
    }
}

/// Line source backed by a synthetic sweep.
#[derive(Debug)]
pub struct SimulatedRig {
    lines: VecDeque<String>,
    total_lines: usize,
}

impl SimulatedRig {
    /// Generate the full line stream up front.
    pub fn new(config: &SimulationConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut lines = VecDeque::new();
        lines.push_back("photodiode rig ready".to_string());
        lines.push_back("START".to_string());

        let samples = sweep(config, &mut rng);
        let per_line = config.readings_per_line.max(1);
        for chunk in samples.chunks(per_line) {
            let line = chunk
                .iter()
                .map(|(v, i)| format!("{:.4},{:.6}", v, i))
                .collect::<Vec<_>>()
                .join(";");
            lines.push_back(line);
        }

        if config.send_stop {
            lines.push_back("STOP".to_string());
        }

        let total_lines = lines.len();
        tracing::debug!(total_lines, samples = samples.len(), "simulated sweep generated");

        Self { lines, total_lines }
    }

    /// Lines not yet read.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

fn sweep<R: Rng>(config: &SimulationConfig, rng: &mut R) -> Vec<(f64, f64)> {
    let mut jitter = |amplitude: f64| {
        if amplitude > 0.0 {
            rng.gen_range(-amplitude..=amplitude)
        } else {
            0.0
        }
    };

    let before = config.samples_before_edge;
    let after = config.samples_after_edge;
    let plateau = config.stopping_voltage + config.step_height;

    (0..before + after)
        .map(|k| {
            let (voltage, current) = if k < before {
                let fraction = 1.0 - k as f64 / before.max(1) as f64;
                (
                    plateau - config.slope_per_sample * k as f64,
                    config.peak_current * fraction,
                )
            } else {
                let offset = (k - before) as f64;
                (config.stopping_voltage - config.slope_per_sample * offset, 0.0)
            };
            (voltage + jitter(config.noise), current + jitter(config.noise * 0.01))
        })
        .collect()
}

impl LineTransport for SimulatedRig {
    fn bytes_available(&mut self) -> AppResult<usize> {
        Ok(self.lines.front().map_or(0, |line| line.len() + 1))
    }

    fn read_line(&mut self) -> AppResult<String> {
        self.lines
            .pop_front()
            .ok_or_else(|| crate::error::DaqError::Read("simulated rig idle".to_string()))
    }

    fn describe(&self) -> String {
        format!("simulated rig ({} lines)", self.total_lines)
    }
}
