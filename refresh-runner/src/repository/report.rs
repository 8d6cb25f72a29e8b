//! Report repository
//!
//! Persists the finalized outcome log as a dated CSV file.

use chrono::{DateTime, Local, Utc};
use refresh_core::domain::outcome::OutcomeRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::PersistenceError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sink for the finalized, ordered outcome records
pub trait ReportSink: Send + Sync {
    /// Writes all records and returns where they were written
    fn persist(&self, records: &[OutcomeRecord]) -> Result<PathBuf, PersistenceError>;
}

/// CSV implementation of ReportSink
///
/// Writes `refresh_log_<dd-mm-YYYY>.csv` into the report directory,
/// replacing a report of the same day.
pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn report_path(&self) -> PathBuf {
        let file_name = format!("refresh_log_{}.csv", Local::now().format("%d-%m-%Y"));
        self.dir.join(file_name)
    }
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "User Name")]
    owner: &'a str,
    #[serde(rename = "Dashboard Name")]
    dashboard_name: &'a str,
    #[serde(rename = "Dataset ID")]
    dataset_id: &'a str,
    #[serde(rename = "Attempt")]
    attempt: u32,
    #[serde(rename = "Start Time")]
    started_at: String,
    #[serde(rename = "End Time")]
    ended_at: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Exhausted")]
    exhausted: bool,
    #[serde(rename = "Error Message")]
    error: String,
}

impl<'a> From<&'a OutcomeRecord> for ReportRow<'a> {
    fn from(record: &'a OutcomeRecord) -> Self {
        Self {
            owner: &record.owner,
            dashboard_name: record.dashboard_name.as_deref().unwrap_or_default(),
            dataset_id: &record.dataset_id,
            attempt: record.attempt,
            started_at: format_time(record.started_at),
            ended_at: format_time(record.ended_at),
            status: record.status_label(),
            exhausted: record.exhausted,
            error: record.error_detail(),
        }
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn write_rows(path: &Path, records: &[OutcomeRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(ReportRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportSink for CsvReportSink {
    fn persist(&self, records: &[OutcomeRecord]) -> Result<PathBuf, PersistenceError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.report_path();
        debug!("Writing {} record(s) to {}", records.len(), path.display());

        write_rows(&path, records).map_err(|source| PersistenceError::Csv {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}
