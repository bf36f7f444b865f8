//! # Planck DAQ Core Library
//!
//! Data acquisition and analysis for the photoelectric determination of Planck's constant.
//! A microcontroller sweeps the bias voltage across an LED-illuminated photodiode and streams
//! `voltage,current` pairs over a serial link; this crate collects one sweep per session,
//! detects the stopping voltage and converts it into an estimate of h.
//!
//! ## Crate Structure
//!
//! - **`protocol`**: Parses received text lines into control tokens or reading segments.
//! - **`acquisition`**: The session state machine (`AwaitingStart -> Collecting -> Finished`),
//!   the estimator hook that fires on completion, and the timer-driven polling runner.
//! - **`estimation`**: Threshold detection policies and the `h = e * V / f` conversion.
//! - **`transport`**: The `LineTransport` seam with serial, scripted and simulated sources.
//! - **`analysis`**: Offline error analysis of repeated measurements (uncertainty
//!   propagation, t-test, bootstrap).
//! - **`storage`**: CSV/JSON export of finished sessions.
//! - **`config`**: Figment-based configuration (TOML file plus `PLANCK_DAQ_` environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: The crate-wide `DaqError`.
//! - **`measurement_types`**: `Reading` and `ControlToken`.

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod estimation;
pub mod logging;
pub mod measurement_types;
pub mod protocol;
pub mod storage;
pub mod transport;

pub use error::{AppResult, DaqError};
pub use measurement_types::{ControlToken, Reading};
