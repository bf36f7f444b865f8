//! Export of finished acquisition sessions.
//!
//! Each run becomes two files sharing a `<prefix>_<UTC timestamp>` stem:
//! a CSV of `elapsed_s,voltage,current` rows and a JSON summary of the estimate.
use crate::acquisition::{FinishCause, RunReport};
use crate::config::StorageConfig;
use crate::error::{AppResult, DaqError};
use crate::estimation::EstimationResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    /// Seconds since `START`
    pub elapsed_s: f64,
    /// Volts
    pub voltage: f64,
    /// Photocurrent
    pub current: f64,
}

/// Contents of the JSON summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// UTC time the files were written (RFC 3339)
    pub written_at: String,
    /// Why collection ended
    pub finish_cause: Option<FinishCause>,
    /// Readings kept
    pub readings: usize,
    /// Malformed segments dropped
    pub rejected_segments: usize,
    /// Lines lost to read or decode errors
    pub discarded_lines: usize,
    /// Threshold estimate
    pub estimation: EstimationResult,
}

/// Paths produced by [`SessionWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    /// Reading table
    pub csv: PathBuf,
    /// Run summary
    pub summary: PathBuf,
}

/// Writes finished runs below an output directory.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    output_dir: PathBuf,
    file_prefix: String,
}

impl SessionWriter {
    /// Writer with an explicit directory and prefix.
    pub fn new<P: Into<PathBuf>>(output_dir: P, file_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    /// Writer from the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.output_dir.clone(), config.file_prefix.clone())
    }

    /// Table rows for a report, one per reading.
    pub fn rows(report: &RunReport) -> Vec<ReadingRow> {
        report
            .session
            .readings()
            .iter()
            .zip(report.session.elapsed())
            .map(|(reading, elapsed)| ReadingRow {
                elapsed_s: elapsed.as_secs_f64(),
                voltage: reading.voltage,
                current: reading.current,
            })
            .collect()
    }

    /// Summary for a report, stamped with the current time.
    pub fn summary(report: &RunReport) -> RunSummary {
        RunSummary {
            written_at: chrono::Utc::now().to_rfc3339(),
            finish_cause: report.session.finish_cause(),
            readings: report.session.readings().len(),
            rejected_segments: report.session.rejected_segments(),
            discarded_lines: report.session.discarded_lines(),
            estimation: report.estimation.clone(),
        }
    }

    /// Write the CSV table and the JSON summary.
    pub fn write(&self, report: &RunReport) -> AppResult<WrittenFiles> {
        #[cfg(not(feature = "storage_csv"))]
        {
            let _ = report;
            return Err(DaqError::FeatureNotEnabled("storage_csv".to_string()));
        }

        #[cfg(feature = "storage_csv")]
        {
            if !self.output_dir.exists() {
                std::fs::create_dir_all(&self.output_dir)
                    .map_err(|e| DaqError::Storage(e.to_string()))?;
            }

            let stem = format!(
                "{}_{}",
                self.file_prefix,
                chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f")
            );
            let files = WrittenFiles {
                csv: self.output_dir.join(format!("{}.csv", stem)),
                summary: self.output_dir.join(format!("{}.json", stem)),
            };

            let mut writer = csv::Writer::from_path(&files.csv)
                .map_err(|e| DaqError::Storage(format!("Failed to create CSV file: {}", e)))?;
            for row in Self::rows(report) {
                writer
                    .serialize(row)
                    .map_err(|e| DaqError::Storage(format!("Failed to write CSV row: {}", e)))?;
            }
            writer
                .flush()
                .map_err(|e| DaqError::Storage(format!("Failed to flush CSV writer: {}", e)))?;

            let json = serde_json::to_string_pretty(&Self::summary(report))?;
            std::fs::write(&files.summary, json)
                .map_err(|e| DaqError::Storage(format!("Failed to write summary: {}", e)))?;

            tracing::info!(
                csv = %files.csv.display(),
                summary = %files.summary.display(),
                "session written"
            );
            Ok(files)
        }
    }
}
