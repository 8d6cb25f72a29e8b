//! Error types for the refresh client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the BI service
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The token endpoint answered but did not grant a token
    #[error("Token grant refused: {0}")]
    TokenRefused(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if the response arrived but could not be understood
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::ParseError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_malformed() {
        assert!(ClientError::ParseError("eof".to_string()).is_malformed());
        assert!(!ClientError::api_error(503, "busy").is_malformed());
        assert!(!ClientError::TokenRefused("invalid_grant".to_string()).is_malformed());
    }
}
