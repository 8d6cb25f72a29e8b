//! Dataset listing DTOs

use serde::{Deserialize, Serialize};

/// A dataset visible to the owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_refreshable: Option<bool>,
}

/// `GET /datasets` response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetList {
    #[serde(default)]
    pub value: Vec<DatasetInfo>,
}
