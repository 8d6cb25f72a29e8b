//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::domain::owner::OwnerCredentials;

/// Identity of a refresh unit: one dataset on behalf of one owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetKey {
    pub owner: String,
    pub dataset_id: String,
}

impl DatasetKey {
    pub fn new(owner: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            dataset_id: dataset_id.into(),
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.dataset_id, self.owner)
    }
}

/// One refresh request for a dataset on behalf of its owner
///
/// Jobs are created with attempt 1 by discovery. A failed job is resubmitted
/// as a new value produced by [`Job::next_attempt`], never mutated in place.
#[derive(Debug, Clone)]
pub struct Job {
    pub credentials: Arc<OwnerCredentials>,
    pub dataset_id: String,
    pub attempt: u32,
}

impl Job {
    /// Creates a first-attempt job
    pub fn new(credentials: Arc<OwnerCredentials>, dataset_id: impl Into<String>) -> Self {
        Self {
            credentials,
            dataset_id: dataset_id.into(),
            attempt: 1,
        }
    }

    /// Owner identity (the user name)
    pub fn owner(&self) -> &str {
        &self.credentials.user_name
    }

    pub fn dashboard_name(&self) -> Option<&str> {
        self.credentials.dashboard_name.as_deref()
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey::new(self.owner(), self.dataset_id.clone())
    }

    /// Returns the same job with its attempt number incremented
    pub fn next_attempt(&self) -> Self {
        Self {
            credentials: Arc::clone(&self.credentials),
            dataset_id: self.dataset_id.clone(),
            attempt: self.attempt + 1,
        }
    }
}
