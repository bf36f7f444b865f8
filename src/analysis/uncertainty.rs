//! Uncertainty propagation for the grating spectrometer and the h estimate.

use crate::estimation::{ELEMENTARY_CHARGE, SPEED_OF_LIGHT};
use serde::{Deserialize, Serialize};

/// Diffraction grating geometry and the spectrometer's angular error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grating {
    /// Line spacing `d` in meters
    pub spacing_m: f64,
    /// Diffraction order `m`
    #[serde(default = "default_order")]
    pub order: u32,
    /// Incidence angle in degrees
    pub alpha_deg: f64,
    /// Diffraction angle in degrees
    pub beta_deg: f64,
    /// Angular error of the spectrometer in degrees
    pub angle_error_deg: f64,
}

fn default_order() -> u32 {
    1
}

/// Wavelength and frequency with their propagated uncertainties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralLine {
    /// Wavelength in meters
    pub wavelength_m: f64,
    /// Uncertainty of the wavelength in meters
    pub sigma_wavelength_m: f64,
    /// Frequency in hertz
    pub frequency_hz: f64,
    /// Uncertainty of the frequency in hertz
    pub sigma_frequency_hz: f64,
}

impl Grating {
    /// Grating equation `lambda = d (sin a + sin b) / m` with first-order error propagation.
    ///
    /// Both partial derivatives are evaluated at the incidence angle, matching how the lab
    /// worksheets propagate the spectrometer error.
    pub fn spectral_line(&self) -> SpectralLine {
        let m = f64::from(self.order.max(1));
        let alpha = self.alpha_deg.to_radians();
        let beta = self.beta_deg.to_radians();
        let delta = self.angle_error_deg.to_radians();

        let wavelength = self.spacing_m * (alpha.sin() + beta.sin()) / m;
        let partial = self.spacing_m * alpha.cos() / m;
        let sigma_wavelength = ((partial * delta).powi(2) + (partial * delta).powi(2)).sqrt();

        let frequency = SPEED_OF_LIGHT / wavelength;
        let sigma_frequency = SPEED_OF_LIGHT * sigma_wavelength / wavelength.powi(2);

        SpectralLine {
            wavelength_m: wavelength,
            sigma_wavelength_m: sigma_wavelength,
            frequency_hz: frequency,
            sigma_frequency_hz: sigma_frequency,
        }
    }
}

/// Analog-to-digital converter of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adc {
    /// Full-scale input range in volts
    #[serde(default = "default_full_scale")]
    pub full_scale_v: f64,
    /// Resolution in bits
    #[serde(default = "default_bits")]
    pub bits: u32,
}

fn default_full_scale() -> f64 {
    5.0
}

fn default_bits() -> u32 {
    14
}

impl Default for Adc {
    fn default() -> Self {
        Self {
            full_scale_v: default_full_scale(),
            bits: default_bits(),
        }
    }
}

impl Adc {
    /// Half of one least-significant bit.
    pub fn quantization_sigma(&self) -> f64 {
        let lsb = self.full_scale_v / 2f64.powi(self.bits as i32);
        0.5 * lsb
    }
}

/// Combine statistical spread with quantization error: `sqrt(s^2 + q^2)`.
pub fn voltage_uncertainty(std_dev: f64, quantization_sigma: f64) -> f64 {
    (std_dev.powi(2) + quantization_sigma.powi(2)).sqrt()
}

/// Propagated uncertainty of `h = e V / f`.
pub fn planck_uncertainty(voltage: f64, sigma_voltage: f64, line: &SpectralLine) -> f64 {
    let f = line.frequency_hz;
    let from_voltage = ELEMENTARY_CHARGE * sigma_voltage / f;
    let from_frequency = ELEMENTARY_CHARGE * voltage * line.sigma_frequency_hz / f.powi(2);
    (from_voltage.powi(2) + from_frequency.powi(2)).sqrt()
}
