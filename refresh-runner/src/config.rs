//! Runner configuration
//!
//! Defines all configurable parameters for a refresh run: concurrency and
//! batching, polling cadence, retry policy, service endpoints and the
//! locations of the input and report files.

use refresh_client::AppCredentials;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::{DispatchSettings, RetryPolicy};

/// Runner configuration
///
/// Built once at startup and handed by value or reference to the components
/// that need it. Nothing in the runner reads configuration from globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST API base URL (e.g., "https://api.powerbi.com/v1.0/myorg")
    pub api_base_url: String,

    /// OAuth2 authority base URL (e.g., "https://login.microsoftonline.com")
    pub authority_url: String,

    /// Application registration used for password-grant tokens
    pub app: AppCredentials,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,

    /// Maximum number of refreshes in flight at once
    pub concurrency_limit: usize,

    /// Intake chunk size of the primary phase
    pub batch_size: usize,

    /// Intake chunk size of retry rounds
    pub retry_batch_size: usize,

    /// Wait between two status sweeps of the active window
    pub poll_interval: Duration,

    /// Number of retry rounds after the primary phase
    pub max_retries: u32,

    /// Sweeps a refresh may stay in progress before it is failed as timed out (0 = no limit)
    pub max_poll_rounds: u32,

    /// CSV of owners (`User name`, `Password`, optional `Dashboard Name`)
    pub owners_file: PathBuf,

    /// CSV of blocked datasets (`User Name`, `DATASET_ID`); may be absent
    pub blocked_file: PathBuf,

    /// Directory the refresh report is written to
    pub report_dir: PathBuf,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(app: AppCredentials, owners_file: PathBuf) -> Self {
        Self {
            api_base_url: "https://api.powerbi.com/v1.0/myorg".to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            app,
            request_timeout: Duration::from_secs(30),
            concurrency_limit: 4,
            batch_size: 12,
            retry_batch_size: 6,
            poll_interval: Duration::from_secs(60),
            max_retries: 2,
            max_poll_rounds: 180, // 3 hours at the default interval
            owners_file,
            blocked_file: PathBuf::from("blocked_datasets.csv"),
            report_dir: PathBuf::from("."),
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Settings for the dispatcher
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            concurrency_limit: self.concurrency_limit,
            poll_interval: self.poll_interval,
            max_poll_rounds: self.max_poll_rounds,
        }
    }

    /// Settings for the retry coordinator
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            batch_size: self.batch_size,
            retry_batch_size: self.retry_batch_size,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("api_base_url", &self.api_base_url),
            ("authority_url", &self.authority_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.app.tenant_id.is_empty() {
            anyhow::bail!("tenant_id cannot be empty");
        }

        if self.app.client_id.is_empty() {
            anyhow::bail!("client_id cannot be empty");
        }

        if self.concurrency_limit == 0 {
            anyhow::bail!("concurrency_limit must be greater than 0");
        }

        if self.batch_size == 0 || self.retry_batch_size == 0 {
            anyhow::bail!("batch sizes must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.owners_file.as_os_str().is_empty() {
            anyhow::bail!("owners_file cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(AppCredentials::default(), PathBuf::from("dashboards.csv"))
    }
}
