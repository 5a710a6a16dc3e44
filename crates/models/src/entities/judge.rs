use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table_entity;

/// pk: hackathon name, rk: user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JudgeEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
}

table_entity!(JudgeEntity, "Judge");

impl JudgeEntity {
    pub fn hackathon_name(&self) -> &str { &self.partition_key }
    pub fn user_id(&self) -> &str { &self.row_key }
}
