//! Blocked set
//!
//! Datasets excluded from refreshing, loaded once at startup and read-only
//! for the rest of the run.

use std::collections::HashSet;

use crate::domain::job::DatasetKey;

/// Set of (owner, dataset) pairs that must never be refreshed
///
/// Entries without an owner block the dataset for every owner.
#[derive(Debug, Clone, Default)]
pub struct BlockedSet {
    pairs: HashSet<DatasetKey>,
    any_owner: HashSet<String>,
}

impl BlockedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks one dataset for one owner
    pub fn insert(&mut self, owner: impl Into<String>, dataset_id: impl Into<String>) {
        self.pairs.insert(DatasetKey::new(owner, dataset_id));
    }

    /// Blocks a dataset regardless of owner
    pub fn insert_for_all_owners(&mut self, dataset_id: impl Into<String>) {
        self.any_owner.insert(dataset_id.into());
    }

    pub fn contains(&self, owner: &str, dataset_id: &str) -> bool {
        self.any_owner.contains(dataset_id)
            || self.pairs.contains(&DatasetKey::new(owner, dataset_id))
    }

    pub fn len(&self) -> usize {
        self.pairs.len() + self.any_owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<DatasetKey> for BlockedSet {
    fn from_iter<I: IntoIterator<Item = DatasetKey>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
            any_owner: HashSet::new(),
        }
    }
}
