//! Owners repository
//!
//! Reads the owners file: one row per owner with `User name`, `Password` and
//! an optional `Dashboard Name` column.

use refresh_core::domain::owner::OwnerCredentials;
use serde::Deserialize;
use std::path::PathBuf;

use super::error::SourceError;

/// Source of the owners whose datasets are refreshed
pub trait OwnerSource: Send + Sync {
    /// Loads owners in file order
    fn load(&self) -> Result<Vec<OwnerCredentials>, SourceError>;
}

/// CSV implementation of OwnerSource
pub struct CsvOwnerSource {
    path: PathBuf,
}

impl CsvOwnerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
struct OwnerRow {
    #[serde(rename = "User name", alias = "User Name")]
    user_name: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Dashboard Name", default)]
    dashboard_name: Option<String>,
}

impl OwnerSource for CsvOwnerSource {
    fn load(&self) -> Result<Vec<OwnerCredentials>, SourceError> {
        let csv_err = |source| SourceError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(csv_err)?;

        let mut owners = Vec::new();
        for (idx, row) in reader.deserialize::<OwnerRow>().enumerate() {
            let row = row.map_err(csv_err)?;
            if row.user_name.is_empty() {
                return Err(SourceError::InvalidRow {
                    path: self.path.clone(),
                    row: idx + 1,
                    message: "empty user name".to_string(),
                });
            }

            let mut owner = OwnerCredentials::new(row.user_name, row.password);
            if let Some(name) = row.dashboard_name.filter(|n| !n.is_empty()) {
                owner = owner.with_dashboard_name(name);
            }
            owners.push(owner);
        }

        Ok(owners)
    }
}
