//! Owner domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials of a dataset owner
///
/// The user name is the owner identity used throughout the run (dedup keys,
/// blocked set, report). The password is only ever handed to the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCredentials {
    pub user_name: String,
    pub password: String,
    /// Optional dashboard label carried through to the report
    pub dashboard_name: Option<String>,
}

impl OwnerCredentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            dashboard_name: None,
        }
    }

    pub fn with_dashboard_name(mut self, dashboard_name: impl Into<String>) -> Self {
        self.dashboard_name = Some(dashboard_name.into());
        self
    }
}

// Passwords must never end up in tracing output.
impl fmt::Debug for OwnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerCredentials")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("dashboard_name", &self.dashboard_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let owner = OwnerCredentials::new("alice@contoso.com", "hunter2");
        let rendered = format!("{:?}", owner);
        assert!(rendered.contains("alice@contoso.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
