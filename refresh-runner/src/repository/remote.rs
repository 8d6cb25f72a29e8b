//! Remote BI service repository
//!
//! Handles communication with the BI service for refresh-related operations:
//! - Acquiring per-owner tokens
//! - Listing an owner's datasets
//! - Starting a refresh (unless one is already running)
//! - Reading the status of the latest refresh

use async_trait::async_trait;
use refresh_client::{AccessToken, ClientError, PowerBiClient};
use refresh_core::domain::owner::OwnerCredentials;
use refresh_core::dto::refresh::{RefreshEntry, RefreshHistory};
use thiserror::Error;
use tracing::debug;

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No token could be obtained for the owner
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network fault or non-success response
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but lacked the expected fields
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<ClientError> for RemoteError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::TokenRefused(detail) => RemoteError::Auth(detail),
            other if other.is_malformed() => RemoteError::Malformed(other.to_string()),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}

/// Result of asking the remote to start a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    AlreadyInProgress,
    Rejected(String),
}

/// Observed state of a started refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Completed,
    InProgress,
    Failed(String),
}

/// Start/poll primitives consumed by the dispatcher
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Exchanges an owner's credentials for a transport token
    async fn acquire_token(&self, owner: &OwnerCredentials) -> Result<AccessToken, RemoteError>;

    /// Asks the remote to start refreshing a dataset
    async fn request_start(
        &self,
        token: &AccessToken,
        dataset_id: &str,
    ) -> Result<StartOutcome, RemoteError>;

    /// Reads the status of the dataset's latest refresh
    async fn poll_status(
        &self,
        token: &AccessToken,
        dataset_id: &str,
    ) -> Result<RefreshStatus, RemoteError>;
}

/// Dataset inventory consumed by discovery
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Lists the ids of the datasets visible to an owner, in service order
    async fn list_datasets(
        &self,
        owner: &OwnerCredentials,
        token: &AccessToken,
    ) -> Result<Vec<String>, RemoteError>;
}

/// HTTP implementation of the remote repositories
pub struct HttpRemoteJobClient {
    client: PowerBiClient,
}

impl HttpRemoteJobClient {
    /// Creates a new HTTP remote repository
    ///
    /// # Arguments
    /// * `client` - A configured BI service client
    pub fn new(client: PowerBiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteJobClient for HttpRemoteJobClient {
    async fn acquire_token(&self, owner: &OwnerCredentials) -> Result<AccessToken, RemoteError> {
        self.client.acquire_token(owner).await.map_err(|e| match e {
            ClientError::TokenRefused(detail) => RemoteError::Auth(detail),
            other => RemoteError::Auth(other.to_string()),
        })
    }

    async fn request_start(
        &self,
        token: &AccessToken,
        dataset_id: &str,
    ) -> Result<StartOutcome, RemoteError> {
        // An unreadable history is not a reason to skip the refresh.
        match self.client.refresh_history(token, dataset_id).await {
            Ok(history) if history.latest().is_some_and(is_running) => {
                return Ok(StartOutcome::AlreadyInProgress);
            }
            Ok(_) => {}
            Err(e) => debug!("Pre-start history check failed for {}: {}", dataset_id, e),
        }

        match self.client.trigger_refresh(token, dataset_id).await {
            Ok(()) => Ok(StartOutcome::Accepted),
            Err(ClientError::ApiError { status, message }) => {
                Ok(StartOutcome::Rejected(format!("{} - {}", status, message)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn poll_status(
        &self,
        token: &AccessToken,
        dataset_id: &str,
    ) -> Result<RefreshStatus, RemoteError> {
        let history = self.client.refresh_history(token, dataset_id).await?;
        classify_history(&history)
    }
}

#[async_trait]
impl InventorySource for HttpRemoteJobClient {
    async fn list_datasets(
        &self,
        owner: &OwnerCredentials,
        token: &AccessToken,
    ) -> Result<Vec<String>, RemoteError> {
        let datasets = self.client.list_datasets(token).await?;
        debug!(
            "Listed {} dataset(s) for {}",
            datasets.len(),
            owner.user_name
        );
        Ok(datasets.into_iter().map(|ds| ds.id).collect())
    }
}

/// Whether a history entry describes a refresh that is still running
fn is_running(entry: &RefreshEntry) -> bool {
    matches!(entry.status.as_deref(), Some("Unknown") | Some("InProgress"))
}

/// Maps the latest history entry to a refresh status
///
/// An empty history or an entry without status is malformed: a refresh that
/// was started must show up in its own history.
fn classify_history(history: &RefreshHistory) -> Result<RefreshStatus, RemoteError> {
    let latest = history
        .latest()
        .ok_or_else(|| RemoteError::Malformed("refresh history is empty".to_string()))?;

    match latest.status.as_deref() {
        Some("Completed") => Ok(RefreshStatus::Completed),
        Some("Failed") => Ok(RefreshStatus::Failed(
            latest
                .failure_detail()
                .unwrap_or_else(|| "Refresh Failed".to_string()),
        )),
        Some(_) => Ok(RefreshStatus::InProgress),
        None => Err(RemoteError::Malformed(
            "refresh entry has no status".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(status: Option<&str>) -> RefreshHistory {
        RefreshHistory {
            value: vec![RefreshEntry {
                status: status.map(str::to_string),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_classify_terminal_states() {
        assert_eq!(
            classify_history(&history(Some("Completed"))),
            Ok(RefreshStatus::Completed)
        );
        assert_eq!(
            classify_history(&history(Some("Failed"))),
            Ok(RefreshStatus::Failed("Refresh Failed".to_string()))
        );
    }

    #[test]
    fn test_classify_failed_with_service_exception() {
        let mut h = history(Some("Failed"));
        h.value[0].service_exception_json =
            Some(r#"{"errorCode":"ModelRefresh_ShortMessage_ProcessingError"}"#.to_string());

        assert_eq!(
            classify_history(&h),
            Ok(RefreshStatus::Failed(
                "ModelRefresh_ShortMessage_ProcessingError".to_string()
            ))
        );
    }

    #[test]
    fn test_classify_other_states_stay_in_progress() {
        for status in ["Unknown", "InProgress", "NotStarted", "Disabled"] {
            assert_eq!(
                classify_history(&history(Some(status))),
                Ok(RefreshStatus::InProgress),
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            classify_history(&RefreshHistory::default()),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            classify_history(&history(None)),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn test_is_running() {
        let entry = |s: &str| RefreshEntry {
            status: Some(s.to_string()),
            ..Default::default()
        };
        assert!(is_running(&entry("Unknown")));
        assert!(is_running(&entry("InProgress")));
        assert!(!is_running(&entry("Completed")));
        assert!(!is_running(&RefreshEntry::default()));
    }

    #[test]
    fn test_client_error_mapping() {
        assert_eq!(
            RemoteError::from(ClientError::TokenRefused("nope".to_string())),
            RemoteError::Auth("nope".to_string())
        );
        assert!(matches!(
            RemoteError::from(ClientError::ParseError("eof".to_string())),
            RemoteError::Malformed(_)
        ));
        assert!(matches!(
            RemoteError::from(ClientError::api_error(500, "boom")),
            RemoteError::Transport(_)
        ));
    }
}
