//! Blocked datasets repository
//!
//! Reads the blocked-datasets file (`User Name`, `DATASET_ID`). A row with
//! an empty user name blocks the dataset for every owner.

use refresh_core::domain::blocked::BlockedSet;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use super::error::SourceError;

/// Source of the blocked set, read once at startup
pub trait BlockedSetSource: Send + Sync {
    /// Loads the blocked set; an absent source yields an empty set
    fn load(&self) -> Result<BlockedSet, SourceError>;
}

/// CSV implementation of BlockedSetSource
pub struct CsvBlockedSetSource {
    path: PathBuf,
}

impl CsvBlockedSetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
struct BlockedRow {
    #[serde(rename = "User Name", alias = "User name", default)]
    user_name: Option<String>,
    #[serde(rename = "DATASET_ID")]
    dataset_id: String,
}

impl BlockedSetSource for CsvBlockedSetSource {
    fn load(&self) -> Result<BlockedSet, SourceError> {
        if !self.path.exists() {
            info!(
                "No blocked datasets file at {}, nothing is blocked",
                self.path.display()
            );
            return Ok(BlockedSet::new());
        }

        let csv_err = |source| SourceError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(csv_err)?;

        let mut blocked = BlockedSet::new();
        for row in reader.deserialize::<BlockedRow>() {
            let row = row.map_err(csv_err)?;
            if row.dataset_id.is_empty() {
                continue;
            }
            match row.user_name.filter(|u| !u.is_empty()) {
                Some(owner) => blocked.insert(owner, row.dataset_id),
                None => blocked.insert_for_all_owners(row.dataset_id),
            }
        }

        info!("Loaded {} blocked dataset entries", blocked.len());
        Ok(blocked)
    }
}
