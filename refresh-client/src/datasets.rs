//! Dataset listing endpoints

use crate::error::Result;
use crate::{AccessToken, PowerBiClient};
use refresh_core::dto::dataset::{DatasetInfo, DatasetList};
use reqwest::header::AUTHORIZATION;

impl PowerBiClient {
    // =============================================================================
    // Datasets
    // =============================================================================

    /// List the datasets visible to the token's owner
    ///
    /// # Arguments
    /// * `token` - The owner's bearer token
    ///
    /// # Returns
    /// Datasets in the order the service returns them
    pub async fn list_datasets(&self, token: &AccessToken) -> Result<Vec<DatasetInfo>> {
        let url = format!("{}/datasets", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .send()
            .await?;

        let list: DatasetList = self.handle_response(response).await?;
        Ok(list.value)
    }
}
