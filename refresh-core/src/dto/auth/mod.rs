//! Token endpoint DTOs

use serde::{Deserialize, Serialize};

/// Password-grant token request, sent form-encoded
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub resource: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub scope: &'a str,
}

/// Token endpoint response
///
/// A successful grant carries `access_token`; a refused one carries
/// `error` and usually `error_description`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Best available explanation of a refused grant
    pub fn error_detail(&self) -> String {
        match (&self.error, &self.error_description) {
            (_, Some(description)) => description.clone(),
            (Some(error), None) => error.clone(),
            (None, None) => "token response did not contain an access token".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{"token_type":"Bearer","expires_in":"3599","access_token":"abc"}"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_error_detail_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"AADSTS50126: bad password"}"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.access_token.is_none());
        assert_eq!(parsed.error_detail(), "AADSTS50126: bad password");
    }
}
