//! Dispatcher
//!
//! Drives one wave of refresh jobs to terminal outcomes under a fixed
//! concurrency ceiling. Jobs are taken in fixed-size batches, strictly one
//! batch after the other. Within a batch the dispatcher alternates between:
//! - Filling the active window: token + start requests for as many jobs as
//!   there are free slots
//! - Sweeping the window: one status request per active job, once per poll
//!   interval
//!
//! Remote calls run on spawned workers bounded by a semaphore. Workers only
//! return results; the dispatcher loop alone owns the window, the token cache
//! and the outcome log, and applies every change in intake order.

use chrono::{DateTime, Utc};
use refresh_client::AccessToken;
use refresh_core::domain::job::Job;
use refresh_core::domain::outcome::{
    FailureReason, JobOutcome, OutcomeLog, OutcomeRecord, SkipReason,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::repository::{RefreshStatus, RemoteError, RemoteJobClient, StartOutcome};

/// Dispatcher tuning
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Maximum number of active jobs (and of concurrent remote calls)
    pub concurrency_limit: usize,
    /// Wait before each status sweep
    pub poll_interval: Duration,
    /// Sweeps after which a job still in progress is failed (0 = no limit)
    pub max_poll_rounds: u32,
}

/// Parameters of one wave: the primary phase or a retry round
#[derive(Debug, Clone, Copy)]
pub struct Wave {
    /// 1 for the primary phase, 2.. for retry rounds
    pub round: u32,
    /// Intake chunk size
    pub batch_size: usize,
    /// Failures of the final wave are marked exhausted
    pub is_final: bool,
}

impl Wave {
    fn label(&self) -> String {
        if self.round == 1 {
            "main".to_string()
        } else {
            format!("retry {}", self.round)
        }
    }
}

/// A job admitted to the active window
struct ActiveJob {
    job: Job,
    token: AccessToken,
    started_at: DateTime<Utc>,
    poll_rounds: u32,
}

/// What a submit worker reports back
enum Submission {
    NoToken(String),
    Started {
        token: AccessToken,
        started_at: DateTime<Utc>,
        result: Result<StartOutcome, RemoteError>,
    },
    Crashed(String),
}

/// Per-batch token cache; failures are cached too
type TokenCache = HashMap<String, Result<AccessToken, String>>;

/// Collects the terminal outcomes of a wave
struct WaveOutput<'a> {
    wave: Wave,
    log: &'a mut OutcomeLog,
    failed: &'a mut Vec<Job>,
}

impl WaveOutput<'_> {
    fn emit(
        &mut self,
        job: Job,
        outcome: JobOutcome,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) {
        debug_assert_eq!(job.attempt, self.wave.round);

        let is_failure = outcome.is_failure();
        let mut record = OutcomeRecord::new(&job, outcome, started_at, ended_at);
        if is_failure {
            if self.wave.is_final {
                record = record.mark_exhausted();
            }
            self.failed.push(job);
        }
        self.log.append(record);
    }
}

/// Bounded-concurrency dispatch-and-poll loop
pub struct Dispatcher {
    client: Arc<dyn RemoteJobClient>,
    settings: DispatchSettings,
    workers: Arc<Semaphore>,
}

impl Dispatcher {
    /// Creates a new dispatcher
    ///
    /// # Arguments
    /// * `client` - Remote start/poll primitives
    /// * `settings` - Concurrency ceiling and polling cadence
    pub fn new(client: Arc<dyn RemoteJobClient>, settings: DispatchSettings) -> Self {
        let workers = Arc::new(Semaphore::new(settings.concurrency_limit.max(1)));
        Self {
            client,
            settings,
            workers,
        }
    }

    /// Runs one wave and appends one record per job attempt to `log`
    ///
    /// # Returns
    /// The jobs whose attempt failed, in emission order, with their attempt
    /// number unchanged
    pub async fn run_wave(&self, jobs: Vec<Job>, wave: Wave, log: &mut OutcomeLog) -> Vec<Job> {
        let jobs = unique_jobs(jobs);
        let batch_size = wave.batch_size.max(1);
        let mut failed = Vec::new();
        let mut output = WaveOutput {
            wave,
            log,
            failed: &mut failed,
        };

        let mut remaining = jobs.into_iter().peekable();
        let mut batch_no = 0;
        while remaining.peek().is_some() {
            batch_no += 1;
            let batch: Vec<Job> = remaining.by_ref().take(batch_size).collect();
            info!(
                "Starting {} batch {}: {} dataset(s)",
                wave.label(),
                batch_no,
                batch.len()
            );
            self.run_batch(batch, &mut output).await;
        }

        failed
    }

    /// Drives one batch until its intake is exhausted and its window is empty
    async fn run_batch(&self, batch: Vec<Job>, output: &mut WaveOutput<'_>) {
        let limit = self.settings.concurrency_limit.max(1);
        let mut intake: VecDeque<Job> = batch.into();
        let mut window: Vec<ActiveJob> = Vec::with_capacity(limit);
        let mut tokens = TokenCache::new();

        loop {
            // Jobs that are not admitted leave their slot free, so keep filling.
            while window.len() < limit && !intake.is_empty() {
                let take = (limit - window.len()).min(intake.len());
                let jobs: Vec<Job> = intake.drain(..take).collect();
                let submissions = self.submit_all(&jobs, &tokens).await;

                for (job, submission) in jobs.into_iter().zip(submissions) {
                    if let Some(active) = apply_submission(job, submission, &mut tokens, output) {
                        window.push(active);
                    }
                }
            }
            debug_assert!(window.len() <= limit);

            // The fill loop only stops early on a full window.
            if window.is_empty() {
                break;
            }

            debug!(
                "Waiting {:?} before checking {} refresh(es)",
                self.settings.poll_interval,
                window.len()
            );
            time::sleep(self.settings.poll_interval).await;
            window = self.sweep(window, output).await;
        }
    }

    /// Acquires tokens and requests starts for `jobs` concurrently
    ///
    /// Results are returned in the order of `jobs`.
    async fn submit_all(&self, jobs: &[Job], tokens: &TokenCache) -> Vec<Submission> {
        let handles: Vec<JoinHandle<Submission>> = jobs
            .iter()
            .map(|job| {
                let client = Arc::clone(&self.client);
                let workers = Arc::clone(&self.workers);
                let credentials = Arc::clone(&job.credentials);
                let dataset_id = job.dataset_id.clone();
                let cached = tokens.get(job.owner()).cloned();

                tokio::spawn(async move {
                    if let Some(Err(detail)) = &cached {
                        return Submission::NoToken(detail.clone());
                    }
                    let _permit = workers.acquire_owned().await.ok();

                    let token = match cached {
                        Some(Ok(token)) => token,
                        _ => match client.acquire_token(&credentials).await {
                            Ok(token) => token,
                            Err(e) => return Submission::NoToken(e.to_string()),
                        },
                    };

                    let started_at = Utc::now();
                    let result = client.request_start(&token, &dataset_id).await;
                    Submission::Started {
                        token,
                        started_at,
                        result,
                    }
                })
            })
            .collect();

        let mut submissions = Vec::with_capacity(handles.len());
        for handle in handles {
            submissions.push(
                handle
                    .await
                    .unwrap_or_else(|e| Submission::Crashed(format!("submit task failed: {}", e))),
            );
        }
        submissions
    }

    /// Polls every active job once, then reclassifies the whole window
    async fn sweep(&self, window: Vec<ActiveJob>, output: &mut WaveOutput<'_>) -> Vec<ActiveJob> {
        let statuses = self.poll_all(&window).await;
        let ended_at = Utc::now();

        let mut still_running = Vec::with_capacity(window.len());
        for (mut active, status) in window.into_iter().zip(statuses) {
            active.poll_rounds += 1;
            let key = active.job.key();

            match status {
                Ok(RefreshStatus::Completed) => {
                    info!("Success: {}", key);
                    output.emit(
                        active.job,
                        JobOutcome::Success,
                        Some(active.started_at),
                        Some(ended_at),
                    );
                }
                Ok(RefreshStatus::Failed(detail)) => {
                    warn!("Refresh failed: {} - {}", key, detail);
                    output.emit(
                        active.job,
                        JobOutcome::Failed(FailureReason::RemoteFailure(detail)),
                        Some(active.started_at),
                        Some(ended_at),
                    );
                }
                Err(e) => {
                    warn!("Status check failed: {} - {}", key, e);
                    output.emit(
                        active.job,
                        JobOutcome::Failed(FailureReason::RemoteFailure(e.to_string())),
                        Some(active.started_at),
                        Some(ended_at),
                    );
                }
                Ok(RefreshStatus::InProgress) if self.timed_out(&active) => {
                    warn!(
                        "Giving up on {} after {} poll rounds",
                        key, active.poll_rounds
                    );
                    output.emit(
                        active.job,
                        JobOutcome::Failed(FailureReason::TimedOut(active.poll_rounds)),
                        Some(active.started_at),
                        Some(ended_at),
                    );
                }
                Ok(RefreshStatus::InProgress) => {
                    debug!("Still refreshing: {} (round {})", key, active.poll_rounds);
                    still_running.push(active);
                }
            }
        }

        still_running
    }

    /// Queries the status of every active job concurrently, in window order
    async fn poll_all(&self, window: &[ActiveJob]) -> Vec<Result<RefreshStatus, RemoteError>> {
        let handles: Vec<JoinHandle<Result<RefreshStatus, RemoteError>>> = window
            .iter()
            .map(|active| {
                let client = Arc::clone(&self.client);
                let workers = Arc::clone(&self.workers);
                let token = active.token.clone();
                let dataset_id = active.job.dataset_id.clone();

                tokio::spawn(async move {
                    let _permit = workers.acquire_owned().await.ok();
                    client.poll_status(&token, &dataset_id).await
                })
            })
            .collect();

        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            statuses.push(handle.await.unwrap_or_else(|e| {
                Err(RemoteError::Transport(format!(
                    "status check task failed: {}",
                    e
                )))
            }));
        }
        statuses
    }

    fn timed_out(&self, active: &ActiveJob) -> bool {
        self.settings.max_poll_rounds > 0 && active.poll_rounds >= self.settings.max_poll_rounds
    }
}

/// Applies a submit result: admits the job or records its outcome
fn apply_submission(
    job: Job,
    submission: Submission,
    tokens: &mut TokenCache,
    output: &mut WaveOutput<'_>,
) -> Option<ActiveJob> {
    let key = job.key();

    match submission {
        Submission::NoToken(detail) => {
            warn!("Token error for {}: {}", key, detail);
            tokens
                .entry(job.owner().to_string())
                .or_insert_with(|| Err(detail.clone()));
            output.emit(
                job,
                JobOutcome::Failed(FailureReason::TokenError(detail)),
                None,
                None,
            );
            None
        }
        Submission::Started {
            token,
            started_at,
            result,
        } => {
            tokens
                .entry(job.owner().to_string())
                .or_insert_with(|| Ok(token.clone()));

            match result {
                Ok(StartOutcome::Accepted) => {
                    info!("Started refresh: {}", key);
                    Some(ActiveJob {
                        job,
                        token,
                        started_at,
                        poll_rounds: 0,
                    })
                }
                Ok(StartOutcome::AlreadyInProgress) => {
                    info!("Already refreshing: {}", key);
                    output.emit(
                        job,
                        JobOutcome::Skipped(SkipReason::AlreadyInProgress),
                        Some(started_at),
                        None,
                    );
                    None
                }
                Ok(StartOutcome::Rejected(detail)) => {
                    warn!("Failed to start refresh: {} - {}", key, detail);
                    output.emit(
                        job,
                        JobOutcome::Failed(FailureReason::StartRejected(detail)),
                        Some(started_at),
                        None,
                    );
                    None
                }
                Err(e) => {
                    warn!("Failed to start refresh: {} - {}", key, e);
                    output.emit(
                        job,
                        JobOutcome::Failed(FailureReason::RemoteFailure(e.to_string())),
                        Some(started_at),
                        None,
                    );
                    None
                }
            }
        }
        Submission::Crashed(detail) => {
            error!("Failed to submit {}: {}", key, detail);
            output.emit(
                job,
                JobOutcome::Failed(FailureReason::RemoteFailure(detail)),
                None,
                None,
            );
            None
        }
    }
}

/// Drops repeated (owner, dataset) pairs so a dataset is never active twice
fn unique_jobs(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| {
            let fresh = seen.insert(job.key());
            if !fresh {
                warn!("Dropping duplicate job {}", job.key());
            }
            fresh
        })
        .collect()
}
