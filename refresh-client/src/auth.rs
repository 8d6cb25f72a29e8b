//! Token endpoint

use crate::PowerBiClient;
use crate::error::{ClientError, Result};
use refresh_core::domain::owner::OwnerCredentials;
use refresh_core::dto::auth::{TokenRequest, TokenResponse};
use std::fmt;
use tracing::debug;

/// Application registration used to request tokens on behalf of owners
#[derive(Clone, Default)]
pub struct AppCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub resource: String,
    pub scope: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource", &self.resource)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Bearer token for one owner
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl PowerBiClient {
    // =============================================================================
    // Authentication
    // =============================================================================

    /// Acquire a token for an owner using the OAuth2 password grant
    ///
    /// The token endpoint reports refused grants with a JSON body and a 4xx
    /// status, so the body is parsed regardless of status.
    ///
    /// # Arguments
    /// * `owner` - The owner whose credentials are exchanged
    ///
    /// # Returns
    /// A bearer token valid for the REST API
    pub async fn acquire_token(&self, owner: &OwnerCredentials) -> Result<AccessToken> {
        let url = format!("{}/{}/oauth2/token", self.authority_url, self.app.tenant_id);
        debug!("Requesting token for {}", owner.user_name);

        let response = self
            .client
            .post(&url)
            .form(&TokenRequest {
                grant_type: "password",
                resource: &self.app.resource,
                client_id: &self.app.client_id,
                client_secret: &self.app.client_secret,
                username: &owner.user_name,
                password: &owner.password,
                scope: &self.app.scope,
            })
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|e| {
            ClientError::ParseError(format!(
                "Failed to parse token response (status {}): {}",
                status.as_u16(),
                e
            ))
        })?;

        match body.access_token {
            Some(ref token) if !token.is_empty() => Ok(AccessToken::new(token.clone())),
            _ => Err(ClientError::TokenRefused(body.error_detail())),
        }
    }
}
