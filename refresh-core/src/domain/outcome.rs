//! Outcome domain types
//!
//! Every attempt of every job ends in exactly one [`OutcomeRecord`]. Records
//! are collected in an append-only [`OutcomeLog`] whose order is the order in
//! which outcomes were decided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::job::{DatasetKey, Job};

/// Terminal classification of one job attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// No transport token could be obtained for the owner
    TokenError(String),
    /// The remote refused to start the refresh
    StartRejected(String),
    /// The refresh failed remotely, or its status could not be read
    RemoteFailure(String),
    /// Still in progress after the given number of poll rounds
    TimedOut(u32),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TokenError(detail) => write!(f, "TokenError: {}", detail),
            FailureReason::StartRejected(detail) => write!(f, "StartRejected: {}", detail),
            FailureReason::RemoteFailure(detail) => write!(f, "RemoteFailure: {}", detail),
            FailureReason::TimedOut(rounds) => {
                write!(f, "TimedOut: still in progress after {} poll rounds", rounds)
            }
        }
    }
}

/// Why an attempt was skipped without running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadyInProgress,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyInProgress => write!(f, "AlreadyInProgress"),
        }
    }
}

/// Immutable record of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub owner: String,
    pub dataset_id: String,
    pub dashboard_name: Option<String>,
    pub attempt: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: JobOutcome,
    /// Set on failures of the final retry round
    pub exhausted: bool,
}

impl OutcomeRecord {
    pub fn new(
        job: &Job,
        outcome: JobOutcome,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            owner: job.owner().to_string(),
            dataset_id: job.dataset_id.clone(),
            dashboard_name: job.dashboard_name().map(str::to_string),
            attempt: job.attempt,
            started_at,
            ended_at,
            outcome,
            exhausted: false,
        }
    }

    pub fn mark_exhausted(mut self) -> Self {
        self.exhausted = true;
        self
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey::new(self.owner.clone(), self.dataset_id.clone())
    }

    /// Human-readable status, tagged with the retry round after the first attempt
    ///
    /// e.g. `Success`, `Failed (Retry 2)`, `Skipped`.
    pub fn status_label(&self) -> String {
        let base = match self.outcome {
            JobOutcome::Success => "Success",
            JobOutcome::Failed(_) => "Failed",
            JobOutcome::Skipped(_) => "Skipped",
        };
        if self.attempt > 1 {
            format!("{} (Retry {})", base, self.attempt)
        } else {
            base.to_string()
        }
    }

    /// Error detail column; empty on success
    pub fn error_detail(&self) -> String {
        match &self.outcome {
            JobOutcome::Success => String::new(),
            JobOutcome::Failed(reason) => reason.to_string(),
            JobOutcome::Skipped(reason) => reason.to_string(),
        }
    }
}

/// Append-only, ordered log of every attempt's outcome
#[derive(Debug, Clone, Default)]
pub struct OutcomeLog {
    records: Vec<OutcomeRecord>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: OutcomeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records referencing the given dataset
    pub fn attempts_for(&self, key: &DatasetKey) -> usize {
        self.records
            .iter()
            .filter(|r| r.owner == key.owner && r.dataset_id == key.dataset_id)
            .count()
    }

    pub fn summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for record in &self.records {
            match record.outcome {
                JobOutcome::Success => summary.succeeded += 1,
                JobOutcome::Failed(_) => summary.failed += 1,
                JobOutcome::Skipped(_) => summary.skipped += 1,
            }
            if record.exhausted {
                summary.exhausted += 1;
            }
        }
        summary
    }

    /// Finalizes the log into its ordered records
    pub fn into_records(self) -> Vec<OutcomeRecord> {
        self.records
    }
}

/// Per-record tallies of an [`OutcomeLog`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub exhausted: usize,
}

impl OutcomeSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}
