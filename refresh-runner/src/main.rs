//! Refresh Runner
//!
//! Refreshes every dataset owned by a list of accounts and records the outcome
//! of every attempt.
//!
//! Architecture:
//! - Configuration: CLI flags with environment fallbacks
//! - Repositories: CSV inputs and report, HTTP access to the remote service
//! - Services: Discovery of the candidate job set
//! - Scheduler: Bounded-concurrency dispatch with round-based polling and retries
//!
//! A run loads the owners and the blocked list, discovers datasets, drives
//! every job through the primary wave and the retry rounds, then writes the
//! ordered outcome log as a dated CSV report.

mod config;
mod repository;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use refresh_client::{AppCredentials, PowerBiClient};
use refresh_core::domain::outcome::{OutcomeLog, OutcomeRecord};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::{
    BlockedSetSource, CsvBlockedSetSource, CsvOwnerSource, CsvReportSink, HttpRemoteJobClient,
    OwnerSource, PersistenceError, ReportSink,
};
use crate::scheduler::{Dispatcher, RetryCoordinator};
use crate::service::{DiscoveryService, StandardDiscoveryService};

#[derive(Parser)]
#[command(name = "refresh-runner")]
#[command(about = "Refresh every dataset of a list of owners", long_about = None)]
struct Cli {
    /// CSV of owners (User name, Password, optional Dashboard Name)
    #[arg(long, env = "PBI_OWNERS_FILE", default_value = "dashboards.csv")]
    owners_file: PathBuf,

    /// CSV of datasets that must never be refreshed (User Name, DATASET_ID)
    #[arg(long, env = "PBI_BLOCKED_FILE", default_value = "blocked_datasets.csv")]
    blocked_file: PathBuf,

    /// Directory the refresh log is written to
    #[arg(long, env = "PBI_REPORT_DIR", default_value = ".")]
    report_dir: PathBuf,

    /// REST API base URL
    #[arg(
        long,
        env = "PBI_API_URL",
        default_value = "https://api.powerbi.com/v1.0/myorg"
    )]
    api_base_url: String,

    /// OAuth2 authority base URL
    #[arg(
        long,
        env = "PBI_AUTHORITY_URL",
        default_value = "https://login.microsoftonline.com"
    )]
    authority_url: String,

    #[arg(long, env = "PBI_TENANT_ID")]
    tenant_id: String,

    #[arg(long, env = "PBI_CLIENT_ID")]
    client_id: String,

    #[arg(long, env = "PBI_CLIENT_SECRET", hide_env_values = true, default_value = "")]
    client_secret: String,

    #[arg(
        long,
        env = "PBI_RESOURCE",
        default_value = "https://analysis.windows.net/powerbi/api"
    )]
    resource: String,

    #[arg(long, env = "PBI_SCOPE", default_value = "openid")]
    scope: String,

    /// Maximum number of refreshes in flight at once
    #[arg(long, env = "PBI_CONCURRENCY_LIMIT", default_value_t = 4)]
    concurrency_limit: usize,

    /// Intake chunk size of the primary phase
    #[arg(long, env = "PBI_BATCH_SIZE", default_value_t = 12)]
    batch_size: usize,

    /// Intake chunk size of retry rounds
    #[arg(long, env = "PBI_RETRY_BATCH_SIZE", default_value_t = 6)]
    retry_batch_size: usize,

    /// Seconds between two status sweeps
    #[arg(long, env = "PBI_POLL_INTERVAL", default_value_t = 60)]
    poll_interval: u64,

    /// Retry rounds after the primary phase
    #[arg(long, env = "PBI_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Sweeps before a refresh still in progress is given up (0 = never)
    #[arg(long, env = "PBI_MAX_POLL_ROUNDS", default_value_t = 180)]
    max_poll_rounds: u32,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PBI_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,
}

impl Cli {
    fn into_config(self) -> Config {
        let app = AppCredentials {
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            client_secret: self.client_secret,
            resource: self.resource,
            scope: self.scope,
        };

        let mut config = Config::new(app, self.owners_file)
            .with_concurrency_limit(self.concurrency_limit)
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_max_retries(self.max_retries);
        config.api_base_url = self.api_base_url;
        config.authority_url = self.authority_url;
        config.request_timeout = Duration::from_secs(self.request_timeout);
        config.batch_size = self.batch_size;
        config.retry_batch_size = self.retry_batch_size;
        config.max_poll_rounds = self.max_poll_rounds;
        config.blocked_file = self.blocked_file;
        config.report_dir = self.report_dir;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refresh_runner=info,refresh_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config();
    config.validate().context("Invalid configuration")?;

    let run_id = Uuid::new_v4();
    run(config)
        .instrument(info_span!("refresh_run", run_id = %run_id))
        .await
}

/// Runs one complete refresh: discovery, dispatch with retries, report
async fn run(config: Config) -> Result<()> {
    info!(
        "Starting refresh run: concurrency={}, batch_size={}, poll_interval={:?}, max_retries={}",
        config.concurrency_limit, config.batch_size, config.poll_interval, config.max_retries
    );

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let client = PowerBiClient::with_client(
        config.api_base_url.clone(),
        config.authority_url.clone(),
        config.app.clone(),
        http,
    );
    info!(
        "Using API {} with authority {}",
        client.api_base_url(),
        client.authority_url()
    );
    let remote = Arc::new(HttpRemoteJobClient::new(client));

    let owners = CsvOwnerSource::new(config.owners_file.clone())
        .load()
        .context("Failed to load owners")?;
    let blocked = CsvBlockedSetSource::new(config.blocked_file.clone())
        .load()
        .context("Failed to load blocked datasets")?;
    info!(
        "Loaded {} owner(s) and {} blocked dataset rule(s)",
        owners.len(),
        blocked.len()
    );

    let discovery = StandardDiscoveryService::new(remote.clone(), remote.clone());
    let jobs = discovery.discover(owners, &blocked).await;
    if jobs.is_empty() {
        warn!("No datasets to refresh");
    }

    let dispatcher = Dispatcher::new(remote, config.dispatch_settings());
    let log = RetryCoordinator::new(dispatcher, config.retry_policy())
        .run(jobs)
        .await;

    print_summary(&log);

    let sink = CsvReportSink::new(config.report_dir.clone());
    let path = persist_report(&sink, &log.into_records(), &mut std::io::stdout())
        .context("Failed to persist refresh log")?;
    info!("Refresh log written to {}", path.display());
    Ok(())
}

/// Persists the records, dumping them to `fallback` if the sink fails
///
/// The sink error is still returned so the run ends in failure.
fn persist_report(
    sink: &dyn ReportSink,
    records: &[OutcomeRecord],
    fallback: &mut dyn Write,
) -> Result<PathBuf, PersistenceError> {
    sink.persist(records).inspect_err(|e| {
        error!("Failed to write refresh log: {}", e);
        dump_records(records, fallback);
    })
}

fn print_summary(log: &OutcomeLog) {
    let summary = log.summary();

    println!();
    println!("{}", "Refresh summary".bold());
    println!("  Attempts:  {}", summary.total());
    println!("  Succeeded: {}", summary.succeeded.to_string().green());
    println!("  Failed:    {}", summary.failed.to_string().red());
    println!("  Skipped:   {}", summary.skipped.to_string().yellow());
    if summary.exhausted > 0 {
        println!(
            "  {} dataset(s) still failing after all retries",
            summary.exhausted.to_string().red().bold()
        );
    }
}

/// Last-resort output when the report cannot be written: one JSON record per line
fn dump_records(records: &[OutcomeRecord], out: &mut dyn Write) {
    for record in records {
        let written = serde_json::to_string(record)
            .map_err(|e| e.to_string())
            .and_then(|line| writeln!(out, "{}", line).map_err(|e| e.to_string()));
        if let Err(e) = written {
            error!("Failed to dump record for {}: {}", record.key(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refresh_core::domain::job::Job;
    use refresh_core::domain::outcome::{FailureReason, JobOutcome};
    use refresh_core::domain::owner::OwnerCredentials;

    fn records() -> Vec<OutcomeRecord> {
        let owner = Arc::new(OwnerCredentials::new("alice", "pw"));
        let first = Job::new(Arc::clone(&owner), "ds-1");
        vec![
            OutcomeRecord::new(&first, JobOutcome::Success, None, None),
            OutcomeRecord::new(
                &Job::new(owner, "ds-2"),
                JobOutcome::Failed(FailureReason::TokenError("invalid_grant".to_string())),
                None,
                None,
            )
            .mark_exhausted(),
        ]
    }

    #[test]
    fn test_persist_failure_dumps_records_and_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "not a directory").unwrap();

        let records = records();
        let mut fallback = Vec::new();
        let result = persist_report(&CsvReportSink::new(&blocker), &records, &mut fallback);

        assert!(matches!(result, Err(PersistenceError::Io { .. })));

        let dumped: Vec<OutcomeRecord> = String::from_utf8(fallback)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(dumped, records);
    }

    #[test]
    fn test_persist_success_writes_nothing_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut fallback = Vec::new();

        let path = persist_report(&CsvReportSink::new(dir.path()), &records(), &mut fallback).unwrap();

        assert!(path.exists());
        assert!(fallback.is_empty());
    }
}
