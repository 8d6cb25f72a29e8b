//! Refresh endpoints

use crate::error::Result;
use crate::{AccessToken, PowerBiClient};
use refresh_core::dto::refresh::RefreshHistory;
use reqwest::header::AUTHORIZATION;

impl PowerBiClient {
    // =============================================================================
    // Refreshes
    // =============================================================================

    /// Fetch the most recent refresh history entries of a dataset
    ///
    /// # Arguments
    /// * `token` - The owner's bearer token
    /// * `dataset_id` - The dataset ID
    ///
    /// # Returns
    /// The history envelope, newest entry first
    pub async fn refresh_history(
        &self,
        token: &AccessToken,
        dataset_id: &str,
    ) -> Result<RefreshHistory> {
        let url = format!("{}/datasets/{}/refreshes", self.api_base_url, dataset_id);
        let response = self
            .client
            .get(&url)
            .query(&[("$top", "1")])
            .header(AUTHORIZATION, token.bearer())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Ask the service to start refreshing a dataset
    ///
    /// Succeeds only when the service answers `202 Accepted`.
    ///
    /// # Arguments
    /// * `token` - The owner's bearer token
    /// * `dataset_id` - The dataset ID
    pub async fn trigger_refresh(&self, token: &AccessToken, dataset_id: &str) -> Result<()> {
        let url = format!("{}/datasets/{}/refreshes", self.api_base_url, dataset_id);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, token.bearer())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        self.handle_accepted_response(response).await
    }
}
