//! Discovery service
//!
//! Builds the ordered candidate job sequence for a run:
//! - De-duplicating owners on (user name, password)
//! - Listing each owner's datasets through the inventory
//! - Dropping blocked datasets and duplicate (owner, dataset) pairs
//!
//! Failures are scoped to a single owner: an owner whose token or listing
//! fails contributes no jobs and the run goes on.

use async_trait::async_trait;
use refresh_core::domain::blocked::BlockedSet;
use refresh_core::domain::job::{DatasetKey, Job};
use refresh_core::domain::owner::OwnerCredentials;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::repository::{InventorySource, RemoteJobClient};

/// Service trait for building the candidate job set
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Discovers first-attempt jobs for the given owners
    ///
    /// # Arguments
    /// * `owners` - Owners in input order, possibly with duplicates
    /// * `blocked` - Datasets that must never be scheduled
    ///
    /// # Returns
    /// Jobs in discovery order, unique per (owner, dataset)
    async fn discover(&self, owners: Vec<OwnerCredentials>, blocked: &BlockedSet) -> Vec<Job>;
}

/// Standard implementation of DiscoveryService
pub struct StandardDiscoveryService {
    remote: Arc<dyn RemoteJobClient>,
    inventory: Arc<dyn InventorySource>,
}

impl StandardDiscoveryService {
    /// Creates a new discovery service
    ///
    /// # Arguments
    /// * `remote` - Used to acquire each owner's token
    /// * `inventory` - Used to list each owner's datasets
    pub fn new(remote: Arc<dyn RemoteJobClient>, inventory: Arc<dyn InventorySource>) -> Self {
        Self { remote, inventory }
    }
}

#[async_trait]
impl DiscoveryService for StandardDiscoveryService {
    async fn discover(&self, owners: Vec<OwnerCredentials>, blocked: &BlockedSet) -> Vec<Job> {
        let owners = dedupe_owners(owners);
        info!("Gathering datasets for {} owner(s)", owners.len());

        let mut candidates = Vec::new();
        for owner in owners {
            let owner = Arc::new(owner);

            let token = match self.remote.acquire_token(&owner).await {
                Ok(token) => token,
                Err(e) => {
                    warn!("Skipping owner {}: {}", owner.user_name, e);
                    continue;
                }
            };

            match self.inventory.list_datasets(&owner, &token).await {
                Ok(datasets) => {
                    debug!("{} dataset(s) for {}", datasets.len(), owner.user_name);
                    candidates.extend(datasets.into_iter().map(|id| (Arc::clone(&owner), id)));
                }
                Err(e) => warn!("Failed to fetch datasets for {}: {}", owner.user_name, e),
            }
        }

        let jobs = dedupe_and_filter(candidates, blocked);
        info!("Discovered {} dataset(s) to refresh", jobs.len());
        jobs
    }
}

/// Drops repeated owners, keeping the first row for each (user name, password)
pub fn dedupe_owners(owners: Vec<OwnerCredentials>) -> Vec<OwnerCredentials> {
    let mut seen = HashSet::new();
    owners
        .into_iter()
        .filter(|o| seen.insert((o.user_name.clone(), o.password.clone())))
        .collect()
}

/// Turns raw (owner, dataset) candidates into first-attempt jobs
///
/// Blocked pairs are removed and duplicate pairs collapse to their first
/// occurrence. Order is otherwise preserved.
pub fn dedupe_and_filter(
    candidates: impl IntoIterator<Item = (Arc<OwnerCredentials>, String)>,
    blocked: &BlockedSet,
) -> Vec<Job> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for (owner, dataset_id) in candidates {
        if blocked.contains(&owner.user_name, &dataset_id) {
            debug!("Blocked: {} ({})", dataset_id, owner.user_name);
            continue;
        }
        if !seen.insert(DatasetKey::new(owner.user_name.clone(), dataset_id.clone())) {
            continue;
        }
        jobs.push(Job::new(owner, dataset_id));
    }

    jobs
}
