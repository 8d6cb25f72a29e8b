//! Refresh history DTOs

use serde::{Deserialize, Serialize};

/// One entry of a dataset's refresh history, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshEntry {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub refresh_type: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// `Unknown` while running, then `Completed`, `Failed` or `Disabled`
    #[serde(default)]
    pub status: Option<String>,
    /// JSON-encoded error payload, present on failed refreshes
    #[serde(default)]
    pub service_exception_json: Option<String>,
}

impl RefreshEntry {
    /// Extracts a readable failure detail from `serviceExceptionJson`
    ///
    /// Falls back to the raw payload when it is not the expected JSON object.
    pub fn failure_detail(&self) -> Option<String> {
        let raw = self.service_exception_json.as_deref()?;
        match serde_json::from_str::<ServiceException>(raw) {
            Ok(ServiceException {
                error_code: Some(code),
                error_description: Some(description),
            }) => Some(format!("{}: {}", code, description)),
            Ok(ServiceException {
                error_code: Some(code),
                ..
            }) => Some(code),
            _ => Some(raw.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceException {
    error_code: Option<String>,
    error_description: Option<String>,
}

/// `GET /datasets/{id}/refreshes` response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshHistory {
    #[serde(default)]
    pub value: Vec<RefreshEntry>,
}

impl RefreshHistory {
    pub fn latest(&self) -> Option<&RefreshEntry> {
        self.value.first()
    }
}
