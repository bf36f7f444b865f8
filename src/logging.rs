//! Tracing Infrastructure
//!
//! Structured logging for the library and the CLI, built on `tracing` and
//! `tracing-subscriber`:
//! - Pretty, compact or JSON output
//! - `RUST_LOG` filtering, falling back to the configured level
//! - Idempotent initialization (safe to call from tests)
//!
//! # Example
//! ```no_run
//! use planck_daq::{config::DaqConfig, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DaqConfig::load()?;
//! logging::init_from_config(&config)?;
//! info!(port = %config.serial.port, "starting");
//! # Ok(())
//! # }
//! ```

use crate::config::DaqConfig;
use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Output format for tracing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
    /// JSON format for structured logging (for log aggregation)
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include span events (NEW, CLOSE)
    pub with_span_events: bool,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to enable ANSI colors (ignored for JSON)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create tracing config from the application configuration
    pub fn from_config(config: &DaqConfig) -> AppResult<Self> {
        let level = parse_log_level(&config.application.log_level)?;

        Ok(Self {
            level,
            format: config.application.log_format,
            ..Default::default()
        })
    }
}

/// Initialize tracing from the application configuration
pub fn init_from_config(config: &DaqConfig) -> AppResult<()> {
    init(TracingConfig::from_config(config)?)
}

/// Initialize tracing with custom configuration
///
/// If a global subscriber is already installed this returns `Ok(())`.
pub fn init(config: TracingConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LevelFilter::from_level(config.level).to_string()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line)
        .with_writer(std::io::stderr);

    let layer = match config.format {
        OutputFormat::Pretty => base.pretty().with_ansi(config.with_ansi).boxed(),
        OutputFormat::Compact => base.compact().with_ansi(config.with_ansi).boxed(),
        OutputFormat::Json => base.json().with_ansi(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            // Tests and embedding applications may have installed one already.
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(DaqError::Configuration(format!(
                    "Failed to initialize tracing: {}",
                    e
                )))
            }
        })
}

/// Parse a log level name, case-insensitively.
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    level.parse::<Level>().map_err(|_| {
        DaqError::Configuration(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));

        // Case insensitive
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));

        // Invalid
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_tracing_config_from_daq_config() {
        let mut config = DaqConfig::default();
        config.application.log_level = "debug".to_string();
        config.application.log_format = OutputFormat::Json;

        let tracing_config = TracingConfig::from_config(&config).unwrap();
        assert!(matches!(tracing_config.level, Level::DEBUG));
        assert_eq!(tracing_config.format, OutputFormat::Json);
    }

    #[test]
    fn test_tracing_config_defaults_to_plain_compact() {
        let tracing_config = TracingConfig::from_config(&DaqConfig::default()).unwrap();
        assert!(matches!(tracing_config.level, Level::INFO));
        assert_eq!(tracing_config.format, OutputFormat::Compact);
        assert!(!tracing_config.with_span_events);
    }

    #[test]
    fn test_filter_directive_is_lowercase_level() {
        assert_eq!(LevelFilter::from_level(Level::WARN).to_string(), "warn");
    }
}
