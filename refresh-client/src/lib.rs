//! Refresh HTTP Client
//!
//! A small, type-safe HTTP client for the BI service REST API and its
//! OAuth2 token endpoint.
//!
//! The client knows URLs, payload shapes and status codes. It does not decide
//! what a response means for a refresh job; that classification lives in the
//! runner's repository layer.
//!
//! # Example
//!
//! ```no_run
//! use refresh_client::{AppCredentials, PowerBiClient};
//! use refresh_core::domain::owner::OwnerCredentials;
//!
//! #[tokio::main]
//! async fn main() -> refresh_client::Result<()> {
//!     let client = PowerBiClient::new(
//!         "https://api.powerbi.com/v1.0/myorg",
//!         "https://login.microsoftonline.com",
//!         AppCredentials::default(),
//!     );
//!
//!     let owner = OwnerCredentials::new("report.owner@contoso.com", "secret");
//!     let token = client.acquire_token(&owner).await?;
//!     let datasets = client.list_datasets(&token).await?;
//!
//!     println!("{} datasets visible", datasets.len());
//!     Ok(())
//! }
//! ```

mod auth;
mod datasets;
pub mod error;
mod refreshes;

// Re-export commonly used types
pub use auth::{AccessToken, AppCredentials};
pub use error::{ClientError, Result};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// HTTP client for the BI service
///
/// Endpoints are organized into logical groups:
/// - Authentication (password-grant tokens)
/// - Dataset listing
/// - Refresh history and refresh triggering
#[derive(Debug, Clone)]
pub struct PowerBiClient {
    /// REST API base URL (e.g., "https://api.powerbi.com/v1.0/myorg")
    api_base_url: String,
    /// Token authority base URL (e.g., "https://login.microsoftonline.com")
    authority_url: String,
    /// Application registration used for every token request
    app: AppCredentials,
    /// HTTP client instance
    client: Client,
}

impl PowerBiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_base_url` - The REST API base URL
    /// * `authority_url` - The OAuth2 authority base URL
    /// * `app` - Application registration credentials
    pub fn new(
        api_base_url: impl Into<String>,
        authority_url: impl Into<String>,
        app: AppCredentials,
    ) -> Self {
        Self::with_client(api_base_url, authority_url, app, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        api_base_url: impl Into<String>,
        authority_url: impl Into<String>,
        app: AppCredentials,
        client: Client,
    ) -> Self {
        let api_base_url = api_base_url.into();
        let authority_url = authority_url.into();
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            authority_url: authority_url.trim_end_matches('/').to_string(),
            app,
            client,
        }
    }

    /// Get the REST API base URL
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Get the token authority base URL
    pub fn authority_url(&self) -> &str {
        &self.authority_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle a response that must be exactly `202 Accepted`
    ///
    /// Asynchronous operations are only started when the service accepts them;
    /// any other status, including other 2xx codes, is reported as an API error.
    async fn handle_accepted_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if status != StatusCode::ACCEPTED {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PowerBiClient::new(
            "https://api.powerbi.com/v1.0/myorg",
            "https://login.microsoftonline.com",
            AppCredentials::default(),
        );
        assert_eq!(client.api_base_url(), "https://api.powerbi.com/v1.0/myorg");
        assert_eq!(client.authority_url(), "https://login.microsoftonline.com");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PowerBiClient::new(
            "http://localhost:8080/api/",
            "http://localhost:8081/",
            AppCredentials::default(),
        );
        assert_eq!(client.api_base_url(), "http://localhost:8080/api");
        assert_eq!(client.authority_url(), "http://localhost:8081");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = PowerBiClient::with_client(
            "http://localhost:8080",
            "http://localhost:8081",
            AppCredentials::default(),
            Client::new(),
        );
        assert_eq!(client.api_base_url(), "http://localhost:8080");
    }
}
