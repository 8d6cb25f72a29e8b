//! Retry coordinator
//!
//! Runs the primary wave, then up to `max_retries` retry rounds. Each retry
//! round takes exactly the jobs whose previous attempt failed, bumps their
//! attempt number and dispatches them again with the smaller retry batch size.
//! Skipped and successful jobs never come back.

use refresh_core::domain::job::Job;
use refresh_core::domain::outcome::OutcomeLog;
use tracing::info;

use super::dispatcher::{Dispatcher, Wave};

/// Retry tuning
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retry rounds after the primary wave
    pub max_retries: u32,
    /// Batch size of the primary wave
    pub batch_size: usize,
    /// Batch size of retry rounds
    pub retry_batch_size: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            batch_size: 12,
            retry_batch_size: 6,
        }
    }
}

pub struct RetryCoordinator {
    dispatcher: Dispatcher,
    policy: RetryPolicy,
}

impl RetryCoordinator {
    pub fn new(dispatcher: Dispatcher, policy: RetryPolicy) -> Self {
        Self { dispatcher, policy }
    }

    /// Runs every wave and returns the complete, ordered outcome log
    pub async fn run(&self, jobs: Vec<Job>) -> OutcomeLog {
        let mut log = OutcomeLog::new();
        let last_round = self.policy.max_retries + 1;

        let primary = Wave {
            round: 1,
            batch_size: self.policy.batch_size,
            is_final: last_round == 1,
        };
        let mut failed = self.dispatcher.run_wave(jobs, primary, &mut log).await;

        for round in 2..=last_round {
            let retries: Vec<Job> = failed
                .iter()
                .filter(|job| job.attempt == round - 1)
                .map(Job::next_attempt)
                .collect();
            if retries.is_empty() {
                break;
            }

            info!("Retrying {} failed dataset(s), round {}", retries.len(), round);
            let wave = Wave {
                round,
                batch_size: self.policy.retry_batch_size,
                is_final: round == last_round,
            };
            failed = self.dispatcher.run_wave(retries, wave, &mut log).await;
        }

        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{RefreshStatus, StartOutcome};
    use crate::scheduler::DispatchSettings;
    use crate::service::{DiscoveryService, StandardDiscoveryService};
    use crate::testing::FakeRemote;
    use refresh_core::domain::blocked::BlockedSet;
    use refresh_core::domain::job::DatasetKey;
    use refresh_core::domain::outcome::{FailureReason, JobOutcome};
    use refresh_core::domain::owner::OwnerCredentials;
    use std::sync::Arc;
    use std::time::Duration;

    fn coordinator(fake: &Arc<FakeRemote>, max_retries: u32) -> RetryCoordinator {
        let dispatcher = Dispatcher::new(
            fake.clone(),
            DispatchSettings {
                concurrency_limit: 4,
                poll_interval: Duration::from_secs(60),
                max_poll_rounds: 0,
            },
        );
        RetryCoordinator::new(
            dispatcher,
            RetryPolicy {
                max_retries,
                ..RetryPolicy::default()
            },
        )
    }

    fn jobs(owner: &str, datasets: &[&str]) -> Vec<Job> {
        let owner = Arc::new(OwnerCredentials::new(owner, "pw"));
        datasets
            .iter()
            .map(|d| Job::new(Arc::clone(&owner), *d))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_is_retried_until_exhausted() {
        let fake = Arc::new(FakeRemote::new().always("ds-1", RefreshStatus::Failed("Refresh Failed".to_string())));

        let log = coordinator(&fake, 2).run(jobs("a", &["ds-1"])).await;

        let labels: Vec<String> = log.iter().map(|r| r.status_label()).collect();
        assert_eq!(labels, vec!["Failed", "Failed (Retry 2)", "Failed (Retry 3)"]);

        let exhausted: Vec<bool> = log.iter().map(|r| r.exhausted).collect();
        assert_eq!(exhausted, vec![false, false, true]);
        assert_eq!(fake.start_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_retry_stops_retrying() {
        let fake = Arc::new(FakeRemote::new().polls(
            "ds-1",
            vec![Ok(RefreshStatus::Failed("transient".to_string()))],
        ));

        let log = coordinator(&fake, 2).run(jobs("a", &["ds-1", "ds-2"])).await;

        let labels: Vec<String> = log.iter().map(|r| r.status_label()).collect();
        assert_eq!(labels, vec!["Failed", "Success", "Success (Retry 2)"]);
        assert_eq!(
            fake.start_calls(),
            vec!["ds-1".to_string(), "ds-2".to_string(), "ds-1".to_string()]
        );
        assert_eq!(log.summary().exhausted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_jobs_are_not_retried() {
        let fake = Arc::new(FakeRemote::new().start("ds-1", StartOutcome::AlreadyInProgress));

        let log = coordinator(&fake, 2).run(jobs("a", &["ds-1"])).await;

        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].status_label(), "Skipped");
        assert_eq!(fake.start_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retries_marks_first_failure_exhausted() {
        let fake = Arc::new(FakeRemote::new().fail_token("a"));

        let log = coordinator(&fake, 0).run(jobs("a", &["ds-1"])).await;

        assert_eq!(log.len(), 1);
        let record = &log.records()[0];
        assert!(record.exhausted);
        assert!(matches!(
            record.outcome,
            JobOutcome::Failed(FailureReason::TokenError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded_per_dataset() {
        let fake = Arc::new(
            FakeRemote::new()
                .always("ds-1", RefreshStatus::Failed("boom".to_string()))
                .polls("ds-2", vec![Ok(RefreshStatus::Failed("once".to_string()))])
                .fail_token("b"),
        );
        let mut input = jobs("a", &["ds-1", "ds-2", "ds-3"]);
        input.extend(jobs("b", &["ds-4"]));

        let log = coordinator(&fake, 3).run(input).await;

        for (owner, ds, expected) in [("a", "ds-1", 4), ("a", "ds-2", 2), ("a", "ds-3", 1), ("b", "ds-4", 4)] {
            let attempts = log.attempts_for(&DatasetKey::new(owner, ds));
            assert_eq!(attempts, expected, "{}/{}", owner, ds);
        }
        assert!(log.iter().all(|r| r.attempt <= 4));

        // Exactly one exhausted record per dataset that never succeeded.
        assert_eq!(log.summary().exhausted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovered_jobs_exclude_blocked_dataset() {
        let fake = Arc::new(
            FakeRemote::new()
                .inventory("ownerX", &["datasetY", "datasetW"])
                .inventory("ownerZ", &["datasetY"]),
        );
        let mut blocked = BlockedSet::new();
        blocked.insert("ownerX", "datasetY");

        let discovery = StandardDiscoveryService::new(fake.clone(), fake.clone());
        let owners = vec![
            OwnerCredentials::new("ownerX", "pw"),
            OwnerCredentials::new("ownerZ", "pw"),
        ];
        let jobs = discovery.discover(owners, &blocked).await;
        let log = coordinator(&fake, 2).run(jobs).await;

        assert_eq!(log.len(), 2);
        assert!(
            !log.iter()
                .any(|r| r.owner == "ownerX" && r.dataset_id == "datasetY")
        );
        assert_eq!(log.summary().succeeded, 2);
    }
}
