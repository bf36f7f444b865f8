//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate. Using the
//! `thiserror` crate, it provides one consistent way to report everything from transport
//! failures to configuration and analysis problems.
//!
//! ## Error Hierarchy
//!
//! - **`TransportOpen`**: the serial port could not be opened. Fatal to the run; the session
//!   never starts.
//! - **`TransportLost`**: the port went away mid-run. Surfaced to the caller immediately; the
//!   session is left in whatever state it was in and is not recovered automatically.
//! - **`Read`** / **`Decode`**: a single line could not be read or was not valid UTF-8. These
//!   are non-fatal: the runner logs them, discards the line and keeps polling.
//! - **`Config`** / **`Configuration`**: parse-level and semantic configuration errors.
//! - **`Io`**, **`Serialization`**, **`Storage`**: persistence of finished sessions.
//! - **`Analysis`**: the offline error analysis was given data it cannot work with.
//!
//! Malformed `voltage,current` segments are *not* represented here; see
//! [`crate::protocol::SegmentError`]. Estimation outcomes such as "insufficient data" are
//! result variants, not errors; see [`crate::estimation::EstimationReason`].

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds values that make no sense.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure outside the transport (files, directories).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not be opened.
    #[error("Failed to open transport '{port}': {reason}")]
    TransportOpen {
        /// Port path or identifier.
        port: String,
        /// Underlying cause.
        reason: String,
    },

    /// The transport disappeared (port closed, device unplugged).
    #[error("Transport lost: {0}")]
    TransportLost(String),

    /// A single line could not be read from the transport.
    #[error("Read error: {0}")]
    Read(String),

    /// A single line was read but could not be decoded as text.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Serializing a data product failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Writing a data product failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Statistical analysis could not be carried out.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Functionality compiled out via feature flags.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

impl From<serde_json::Error> for DaqError {
    fn from(value: serde_json::Error) -> Self {
        DaqError::Serialization(value.to_string())
    }
}

impl DaqError {
    /// Whether the acquisition loop may keep polling after this error.
    ///
    /// Only per-line failures are recoverable; everything touching the transport as a whole
    /// halts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DaqError::Read(_) | DaqError::Decode(_))
    }
}
