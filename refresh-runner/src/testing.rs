//! Scripted in-memory remote used by the scheduler and service tests

use async_trait::async_trait;
use refresh_client::AccessToken;
use refresh_core::domain::owner::OwnerCredentials;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::repository::{
    InventorySource, RefreshStatus, RemoteError, RemoteJobClient, StartOutcome,
};

/// Fake remote keyed by dataset id
///
/// Unscripted datasets start with `Accepted` and complete on their first poll.
/// Scripted poll results are consumed in order; once exhausted the dataset's
/// fallback status (or `Completed`) is returned.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    token_failures: HashSet<String>,
    inventory: HashMap<String, Result<Vec<String>, RemoteError>>,
    starts: HashMap<String, Result<StartOutcome, RemoteError>>,
    polls: HashMap<String, VecDeque<Result<RefreshStatus, RemoteError>>>,
    fallback: HashMap<String, RefreshStatus>,
    start_panics: HashSet<String>,

    token_calls: Vec<String>,
    start_calls: Vec<String>,
    poll_calls: Vec<String>,
    running: HashSet<String>,
    max_running: usize,
    in_flight: usize,
    max_in_flight: usize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_token(self, owner: &str) -> Self {
        self.with(|s| {
            s.token_failures.insert(owner.to_string());
        })
    }

    pub fn inventory(self, owner: &str, datasets: &[&str]) -> Self {
        let ids = datasets.iter().map(|d| d.to_string()).collect();
        self.with(|s| {
            s.inventory.insert(owner.to_string(), Ok(ids));
        })
    }

    pub fn inventory_error(self, owner: &str) -> Self {
        self.with(|s| {
            s.inventory.insert(
                owner.to_string(),
                Err(RemoteError::Transport("500 - listing failed".to_string())),
            );
        })
    }

    pub fn start(self, dataset: &str, outcome: StartOutcome) -> Self {
        self.with(|s| {
            s.starts.insert(dataset.to_string(), Ok(outcome));
        })
    }

    pub fn start_error(self, dataset: &str, error: RemoteError) -> Self {
        self.with(|s| {
            s.starts.insert(dataset.to_string(), Err(error));
        })
    }

    /// Makes the start request for `dataset` panic inside its worker
    pub fn panic_on_start(self, dataset: &str) -> Self {
        self.with(|s| {
            s.start_panics.insert(dataset.to_string());
        })
    }

    pub fn polls(self, dataset: &str, results: Vec<Result<RefreshStatus, RemoteError>>) -> Self {
        self.with(|s| {
            s.polls.insert(dataset.to_string(), results.into());
        })
    }

    pub fn always(self, dataset: &str, status: RefreshStatus) -> Self {
        self.with(|s| {
            s.fallback.insert(dataset.to_string(), status);
        })
    }

    pub fn token_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().token_calls.clone()
    }

    pub fn start_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().start_calls.clone()
    }

    pub fn poll_count(&self, dataset: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.poll_calls.iter().filter(|d| *d == dataset).count()
    }

    /// Highest number of refreshes the remote saw running at once
    pub fn max_running(&self) -> usize {
        self.state.lock().unwrap().max_running
    }

    /// Highest number of remote calls executing at once
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    async fn enter(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        // Let sibling workers overlap with this call.
        tokio::task::yield_now().await;
    }

    fn leave(&self) {
        self.state.lock().unwrap().in_flight -= 1;
    }
}

#[async_trait]
impl RemoteJobClient for FakeRemote {
    async fn acquire_token(&self, owner: &OwnerCredentials) -> Result<AccessToken, RemoteError> {
        self.enter().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.token_calls.push(owner.user_name.clone());
            if state.token_failures.contains(&owner.user_name) {
                Err(RemoteError::Auth("invalid_grant".to_string()))
            } else {
                Ok(AccessToken::new(format!("token-{}", owner.user_name)))
            }
        };
        self.leave();
        result
    }

    async fn request_start(
        &self,
        _token: &AccessToken,
        dataset_id: &str,
    ) -> Result<StartOutcome, RemoteError> {
        self.enter().await;
        let panics = {
            let mut state = self.state.lock().unwrap();
            state.start_calls.push(dataset_id.to_string());
            state.start_panics.contains(dataset_id)
        };
        if panics {
            self.leave();
            panic!("start request for {} blew up", dataset_id);
        }
        let result = {
            let mut state = self.state.lock().unwrap();
            let result = state
                .starts
                .get(dataset_id)
                .cloned()
                .unwrap_or(Ok(StartOutcome::Accepted));
            if result == Ok(StartOutcome::Accepted) {
                state.running.insert(dataset_id.to_string());
                state.max_running = state.max_running.max(state.running.len());
            }
            result
        };
        self.leave();
        result
    }

    async fn poll_status(
        &self,
        _token: &AccessToken,
        dataset_id: &str,
    ) -> Result<RefreshStatus, RemoteError> {
        self.enter().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.poll_calls.push(dataset_id.to_string());
            let scripted = state
                .polls
                .get_mut(dataset_id)
                .and_then(|queue| queue.pop_front());
            let result = scripted.unwrap_or_else(|| {
                Ok(state
                    .fallback
                    .get(dataset_id)
                    .cloned()
                    .unwrap_or(RefreshStatus::Completed))
            });
            if result != Ok(RefreshStatus::InProgress) {
                state.running.remove(dataset_id);
            }
            result
        };
        self.leave();
        result
    }
}

#[async_trait]
impl InventorySource for FakeRemote {
    async fn list_datasets(
        &self,
        owner: &OwnerCredentials,
        _token: &AccessToken,
    ) -> Result<Vec<String>, RemoteError> {
        let state = self.state.lock().unwrap();
        state
            .inventory
            .get(&owner.user_name)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
